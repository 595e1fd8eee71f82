//! Email templates for invitations.

use felttrip_storage::Role;

/// Content for invitation emails.
pub struct InvitationEmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl InvitationEmailContent {
    /// Create invitation email content.
    pub fn new(itinerary_name: &str, inviter_name: &str, role: Role, accept_url: &str) -> Self {
        Self {
            subject: format!("{} invited you to \"{}\" on Felttrip", inviter_name, itinerary_name),
            text: Self::text_template(itinerary_name, inviter_name, role, accept_url),
            html: Self::html_template(itinerary_name, inviter_name, role, accept_url),
        }
    }

    fn text_template(itinerary_name: &str, inviter_name: &str, role: Role, accept_url: &str) -> String {
        format!(
            r#"{inviter} invited you to collaborate on the trip itinerary "{itinerary}" as {role}.

Accept the invitation here:

{url}

This invitation expires in 24 hours.

If you weren't expecting this, you can ignore this email.

--
Felttrip"#,
            inviter = inviter_name,
            itinerary = itinerary_name,
            role = role.as_str(),
            url = accept_url,
        )
    }

    fn html_template(itinerary_name: &str, inviter_name: &str, role: Role, accept_url: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 0; background: #f5f5f5; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 40px 20px; }}
        .card {{ background: white; border-radius: 8px; padding: 40px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        h1 {{ color: #1a1a1a; margin-top: 0; font-size: 24px; }}
        .button {{ display: inline-block; padding: 14px 28px; background: #16a34a; color: white; text-decoration: none; border-radius: 8px; font-weight: bold; margin: 24px 0; }}
        .role {{ color: #16a34a; font-weight: bold; }}
        .expires {{ color: #666; font-size: 14px; }}
        .footer {{ margin-top: 32px; padding-top: 20px; border-top: 1px solid #eee; color: #888; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <h1>You're invited to "{itinerary}"</h1>
            <p>{inviter} invited you to collaborate on this trip itinerary as <span class="role">{role}</span>.</p>
            <p><a class="button" href="{url}">Accept invitation</a></p>
            <p class="expires">This invitation expires in 24 hours.</p>
            <div class="footer">
                If you weren't expecting this, you can ignore this email.
            </div>
        </div>
    </div>
</body>
</html>"#,
            itinerary = itinerary_name,
            inviter = inviter_name,
            role = role.as_str(),
            url = accept_url,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_bodies_carry_the_accept_url() {
        let content = InvitationEmailContent::new(
            "Vegas Trip",
            "Alice",
            Role::Editor,
            "https://felttrip.example.com/invite?token=abc",
        );
        assert!(content.subject.contains("Vegas Trip"));
        assert!(content.text.contains("invite?token=abc"));
        assert!(content.html.contains("invite?token=abc"));
        assert!(content.text.contains("editor"));
    }
}
