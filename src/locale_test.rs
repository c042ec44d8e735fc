use super::*;

#[test]
fn parse_accepts_region_variants() {
    assert_eq!(Locale::parse("pt-BR"), Some(Locale::Pt));
    assert_eq!(Locale::parse("es_ES"), Some(Locale::Es));
    assert_eq!(Locale::parse(" EN "), Some(Locale::En));
    assert_eq!(Locale::parse("fr"), None);
    assert_eq!(Locale::parse(""), None);
}

#[test]
fn accept_language_picks_first_supported_entry() {
    assert_eq!(Locale::from_accept_language("fr-FR,es;q=0.8,en;q=0.5"), Some(Locale::Es));
    assert_eq!(Locale::from_accept_language("en-US,en;q=0.9"), Some(Locale::En));
    assert_eq!(Locale::from_accept_language("de,fr"), None);
    assert_eq!(Locale::from_accept_language(""), None);
}

#[test]
fn default_locale_is_portuguese() {
    assert_eq!(Locale::default(), Locale::Pt);
    assert_eq!(Locale::default().as_str(), "pt");
}

#[test]
fn every_message_has_text_in_every_locale() {
    for locale in [Locale::Pt, Locale::Es, Locale::En] {
        for message in Message::ALL {
            assert!(!locale.text(message).is_empty(), "{locale:?} {message:?}");
        }
    }
}

#[test]
fn locales_differ_for_credentials_message() {
    let pt = Locale::Pt.text(Message::InvalidCredentials);
    let es = Locale::Es.text(Message::InvalidCredentials);
    assert_ne!(pt, es);
}

#[test]
fn approved_notification_embeds_title_and_score() {
    let (title, message) = Locale::Es.notification(&NotificationText::TaskApproved { title: "Pintura", score: 9 });
    assert_eq!(title, "¡Tarea Aprobada!");
    assert_eq!(message, "Su tarea \"Pintura\" fue aprobada con nota 9/10");
}

#[test]
fn rejected_notification_embeds_notes() {
    let (_, message) = Locale::En.notification(&NotificationText::TaskRejected { title: "Doors", notes: "misaligned" });
    assert!(message.contains("Doors"));
    assert!(message.ends_with("misaligned"));
}

#[test]
fn issue_notification_names_reporter() {
    let (title, message) = Locale::Pt.notification(&NotificationText::IssueReported { reporter: "João", title: "Vazamento" });
    assert_eq!(title, "Novo Problema Reportado");
    assert_eq!(message, "João reportou: Vazamento");
}

#[test]
fn locale_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Locale::Es).unwrap(), "\"es\"");
    let parsed: Locale = serde_json::from_str("\"en\"").unwrap();
    assert_eq!(parsed, Locale::En);
}
