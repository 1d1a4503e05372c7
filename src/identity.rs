use crate::platform::Sender;

/// Label for the caption: `@username`, then "First Last", then the user id.
/// Never empty.
pub fn display_name(sender: Option<&Sender>) -> String {
    let Some(sender) = sender else {
        return "unknown".to_string();
    };

    if let Some(username) = sender.username.as_deref().filter(|u| !u.is_empty()) {
        return format!("@{}", username);
    }

    let name = [sender.first_name.as_deref(), sender.last_name.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        sender.id.to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(username: Option<&str>, first: Option<&str>, last: Option<&str>) -> Sender {
        Sender {
            id: 42,
            username: username.map(String::from),
            first_name: first.map(String::from),
            last_name: last.map(String::from),
        }
    }

    #[test]
    fn test_username_takes_precedence() {
        let s = sender(Some("alice"), Some("Alice"), Some("Liddell"));
        assert_eq!(display_name(Some(&s)), "@alice");
    }

    #[test]
    fn test_full_name_when_no_username() {
        let s = sender(None, Some("Alice"), Some("Liddell"));
        assert_eq!(display_name(Some(&s)), "Alice Liddell");
    }

    #[test]
    fn test_single_name_part() {
        assert_eq!(display_name(Some(&sender(None, Some("Alice"), None))), "Alice");
        assert_eq!(display_name(Some(&sender(None, None, Some("Liddell")))), "Liddell");
        assert_eq!(
            display_name(Some(&sender(None, Some(""), Some("Liddell")))),
            "Liddell"
        );
    }

    #[test]
    fn test_id_when_no_names() {
        assert_eq!(display_name(Some(&sender(None, None, None))), "42");
        assert_eq!(display_name(Some(&sender(Some(""), Some(""), None))), "42");
    }

    #[test]
    fn test_unknown_without_sender() {
        assert_eq!(display_name(None), "unknown");
    }
}
