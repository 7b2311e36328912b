//! Localised invite and password-reset messages.
//!
//! Invites follow the organisation's language, resets the locale the client
//! sent with the request. Anything unsupported falls back to English.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
    Fr,
}

impl Locale {
    /// Parse a language tag such as `es`, `ES` or `fr-CA`. Unsupported or
    /// malformed tags give English.
    pub fn from_tag(tag: &str) -> Self {
        let language = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match language.as_str() {
            "es" => Locale::Es,
            "fr" => Locale::Fr,
            _ => Locale::En,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
            Locale::Fr => "fr",
        }
    }
}

/// A rendered message ready for the transport.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub plain_body: String,
    pub html_body: String,
}

struct InviteText {
    subject: &'static str,
    message: &'static str,
    description: &'static str,
    action: &'static str,
}

struct ResetText {
    subject: &'static str,
    message: &'static str,
    not_you: &'static str,
    action: &'static str,
}

fn invite_text(locale: Locale) -> InviteText {
    match locale {
        Locale::En => InviteText {
            subject: "Invitation to join {organisation}",
            message: "You have been invited to join {organisation}.",
            description: "Accept the invitation to set up your account. The link expires in a few days.",
            action: "Accept invitation",
        },
        Locale::Es => InviteText {
            subject: "Invitación para unirse a {organisation}",
            message: "Ha sido invitado a unirse a {organisation}.",
            description: "Acepte la invitación para configurar su cuenta. El enlace caduca en unos días.",
            action: "Aceptar invitación",
        },
        Locale::Fr => InviteText {
            subject: "Invitation à rejoindre {organisation}",
            message: "Vous avez été invité à rejoindre {organisation}.",
            description: "Acceptez l'invitation pour configurer votre compte. Le lien expire dans quelques jours.",
            action: "Accepter l'invitation",
        },
    }
}

fn reset_text(locale: Locale) -> ResetText {
    match locale {
        Locale::En => ResetText {
            subject: "Reset your password",
            message: "We received a request to reset your password. The link can only be used once.",
            not_you: "If you didn't request this, you can ignore this email.",
            action: "Reset password",
        },
        Locale::Es => ResetText {
            subject: "Restablezca su contraseña",
            message: "Hemos recibido una solicitud para restablecer su contraseña. El enlace solo se puede usar una vez.",
            not_you: "Si no lo solicitó, puede ignorar este correo.",
            action: "Restablecer contraseña",
        },
        Locale::Fr => ResetText {
            subject: "Réinitialisez votre mot de passe",
            message: "Nous avons reçu une demande de réinitialisation de votre mot de passe. Le lien ne peut être utilisé qu'une fois.",
            not_you: "Si vous n'êtes pas à l'origine de cette demande, ignorez cet e-mail.",
            action: "Réinitialiser le mot de passe",
        },
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_page(heading: &str, paragraphs: &[&str], link: &str, action: &str) -> String {
    let paragraphs: String = paragraphs
        .iter()
        .map(|p| format!("<p style=\"margin: 2em\">{}</p>", p))
        .collect();
    format!(
        r###"<html>
    <body style="font-family: Arial, sans-serif; text-align: center;">
        <h2>{heading}</h2>
        {paragraphs}
        <p>
            <a href="{link}" style="background-color: #00533D; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px;">
                {action}
            </a>
        </p>
    </body>
</html>
"###
    )
}

pub fn invite_message(organisation_name: &str, link: &str, locale: Locale) -> RenderedEmail {
    let text = invite_text(locale);
    let subject = text.subject.replace("{organisation}", organisation_name);
    let message = text.message.replace("{organisation}", organisation_name);

    let escaped = escape_html(organisation_name);
    let html_body = html_page(
        &text.subject.replace("{organisation}", &escaped),
        &[&text.message.replace("{organisation}", &escaped), text.description],
        link,
        text.action,
    );

    RenderedEmail {
        plain_body: format!("{}\n\n{}\n\n{}:\n{}", message, text.description, text.action, link),
        subject,
        html_body,
    }
}

pub fn password_reset_message(link: &str, locale: Locale) -> RenderedEmail {
    let text = reset_text(locale);
    RenderedEmail {
        subject: text.subject.to_string(),
        plain_body: format!("{}\n\n{}\n\n{}:\n{}", text.message, text.not_you, text.action, link),
        html_body: html_page(text.subject, &[text.message, text.not_you], link, text.action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_tags() {
        assert_eq!(Locale::from_tag("es"), Locale::Es);
        assert_eq!(Locale::from_tag("FR-ca"), Locale::Fr);
        assert_eq!(Locale::from_tag("es_MX"), Locale::Es);
        assert_eq!(Locale::from_tag("de"), Locale::En);
        assert_eq!(Locale::from_tag(""), Locale::En);
    }

    #[test]
    fn test_invite_is_localised() {
        let english = invite_message("Fact Checkers", "https://app/invite#token=t", Locale::En);
        let spanish = invite_message("Fact Checkers", "https://app/invite#token=t", Locale::Es);

        assert_eq!(english.subject, "Invitation to join Fact Checkers");
        assert_eq!(spanish.subject, "Invitación para unirse a Fact Checkers");
        assert!(spanish.plain_body.contains("https://app/invite#token=t"));
        assert!(spanish.html_body.contains("Aceptar invitación"));
    }

    #[test]
    fn test_reset_is_localised() {
        let french = password_reset_message("https://app/reset-password#token=t", Locale::Fr);
        assert_eq!(french.subject, "Réinitialisez votre mot de passe");
        assert!(french.html_body.contains("https://app/reset-password#token=t"));
    }

    #[test]
    fn test_organisation_name_is_escaped_in_html() {
        let message = invite_message("<b>Acme</b>", "https://app/invite#token=t", Locale::En);
        assert!(!message.html_body.contains("<b>Acme</b>"));
        assert!(message.html_body.contains("&lt;b&gt;Acme&lt;/b&gt;"));
        assert_eq!(message.subject, "Invitation to join <b>Acme</b>");
    }
}
