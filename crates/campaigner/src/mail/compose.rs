//! Message body composition.
//!
//! Footers are appended in a fixed order: signature, unsubscribe notice,
//! data-protection notice. When no tenant settings are available at all a
//! single default compliance footer is used instead.

use crate::config::FooterConfig;
use crate::settings::TenantSettings;

/// `"Name" <email>` for the From header.
pub fn format_from(name: &str, email: &str) -> String {
    let name = name.replace(['"', '\\'], "");
    if name.trim().is_empty() {
        email.to_string()
    } else {
        format!("\"{}\" <{}>", name.trim(), email)
    }
}

/// Appends the tenant's footers to `html` for a message addressed to `to`.
pub fn compose_body(
    html: &str,
    to: &str,
    settings: Option<&TenantSettings>,
    footer: &FooterConfig,
) -> String {
    let mut body = String::from(html);

    let Some(settings) = settings else {
        body.push_str(&default_compliance_footer(to, footer));
        return body;
    };

    if !settings.email_signature.is_empty() {
        body.push_str(
            "<div style=\"margin-top: 20px; border-top: 1px solid #eee; padding-top: 10px;\">",
        );
        body.push_str(&settings.email_signature);
        body.push_str("</div>");
    }

    if settings.add_unsubscribe_link {
        body.push_str(&unsubscribe_footer(to, footer));
    }

    if settings.gdpr_compliance {
        body.push_str(
            "<div style=\"margin-top: 10px; font-size: 11px; color: #888;\">\
             <p>Your data is processed in accordance with our privacy policy. \
             We respect your privacy and are committed to protecting your personal data.</p>\
             </div>",
        );
    }

    body
}

fn unsubscribe_notice(to: &str, footer: &FooterConfig) -> String {
    format!(
        "<p>This email was sent to {}. If you no longer wish to receive these emails, \
         you can <a href=\"{}\">unsubscribe</a>.</p>",
        escape_html(to),
        escape_html(&unsubscribe_url(&footer.unsubscribe_url, to)),
    )
}

fn unsubscribe_footer(to: &str, footer: &FooterConfig) -> String {
    format!(
        "<div style=\"margin-top: 20px; padding-top: 20px; border-top: 1px solid #eee; \
         font-size: 12px; color: #666;\">{}</div>",
        unsubscribe_notice(to, footer)
    )
}

fn default_compliance_footer(to: &str, footer: &FooterConfig) -> String {
    format!(
        "<div style=\"margin-top: 20px; padding-top: 20px; border-top: 1px solid #eee; \
         font-size: 12px; color: #666;\">{}<p>&copy; {}. All rights reserved.</p></div>",
        unsubscribe_notice(to, footer),
        escape_html(&footer.company_name),
    )
}

fn unsubscribe_url(base: &str, to: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}email={}", base, separator, urlencoding::encode(to))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
