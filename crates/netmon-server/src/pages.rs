//! Static HTML served by the gateway.

const FRONT: &str = r#"
<html>
<head>
<style>
h1 {text-align: center;}
p {text-align: center;}
div {text-align: center;}
</style>
</head>
<body>
"#;

const END: &str = r#"
</body>
</html>
"#;

pub const LOGIN_LINK: &str = r#"<a href="/login">here</a>"#;

pub fn unauthenticated() -> String {
    format!(
        "{FRONT}\n<h1>Local Network Devices</h1>\n<p>You are not authenticated, login {LOGIN_LINK}</p>\n{END}"
    )
}

pub fn expired() -> String {
    format!("Your token has expired, please re-authenticate: {LOGIN_LINK}")
}

pub fn unauthorized(name: &str, contact_email: &str) -> String {
    format!(
        "{FRONT}\n<h1>Hello {}!</h1>\n<p>You're not allowed to see this content, sorry. Contact {} \nif you'd like access.</p>\n{END}",
        escape_html(name),
        escape_html(contact_email),
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_page_links_to_login() {
        let page = unauthenticated();
        assert!(page.contains("<h1>Local Network Devices</h1>"));
        assert!(page.contains(r#"login <a href="/login">here</a>"#));
        assert!(page.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_unauthorized_page_greets_and_names_contact() {
        let page = unauthorized("Mallory", "admin@example.com");
        assert!(page.contains("<h1>Hello Mallory!</h1>"));
        assert!(page.contains("Contact admin@example.com"));
    }

    #[test]
    fn test_names_are_escaped() {
        let page = unauthorized("<script>alert(1)</script>", "a@example.com");
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_expired_message() {
        assert_eq!(
            expired(),
            r#"Your token has expired, please re-authenticate: <a href="/login">here</a>"#
        );
    }
}
