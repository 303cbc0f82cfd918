//! Email bodies

/// Subject line for password reset emails
pub const RESET_PASSWORD_SUBJECT: &str = "Reset your password";

/// HTML body for a password reset email
pub fn reset_password_template(reset_url: &str) -> String {
    format!(
        r#"<h2>Password Reset</h2>
<p>You requested a password reset.</p>
<p>
    <a href="{reset_url}">Reset your password</a>
</p>
<p>This link expires in 15 minutes.</p>
"#
    )
}
