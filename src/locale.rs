//! User-facing text in one table.
//!
//! DESIGN
//! ======
//! Every string the service sends to people (error messages, notification
//! titles and bodies) is looked up here by key and locale. Nothing else in the
//! crate embeds copy, so adding a locale means adding one match arm per key.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Pt,
    Es,
    En,
}

impl Locale {
    /// Parse a language tag such as `pt`, `pt-BR` or `es_ES`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let primary = raw
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "pt" => Some(Self::Pt),
            "es" => Some(Self::Es),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    /// First supported language in an `Accept-Language` header, in listed order.
    #[must_use]
    pub fn from_accept_language(header: &str) -> Option<Self> {
        header
            .split(',')
            .filter_map(|entry| entry.split(';').next())
            .find_map(Self::parse)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pt => "pt",
            Self::Es => "es",
            Self::En => "en",
        }
    }

    #[must_use]
    pub fn text(self, message: Message) -> &'static str {
        use Message as M;
        match (self, message) {
            (Self::Pt, M::InvalidCredentials) => "Email ou senha incorretos. Tente novamente.",
            (Self::Es, M::InvalidCredentials) => "Email o contraseña incorrectos. Inténtalo de nuevo.",
            (Self::En, M::InvalidCredentials) => "Incorrect email or password. Please try again.",

            (Self::Pt, M::AccountDisabled) => "Esta conta está desativada.",
            (Self::Es, M::AccountDisabled) => "Esta cuenta está desactivada.",
            (Self::En, M::AccountDisabled) => "This account is disabled.",

            (Self::Pt, M::Unauthorized) => "Faça login para continuar.",
            (Self::Es, M::Unauthorized) => "Inicia sesión para continuar.",
            (Self::En, M::Unauthorized) => "Please sign in to continue.",

            (Self::Pt, M::Forbidden) => "Você não tem permissão para esta ação.",
            (Self::Es, M::Forbidden) => "No tienes permiso para esta acción.",
            (Self::En, M::Forbidden) => "You are not allowed to do this.",

            (Self::Pt, M::NotFound) => "Registro não encontrado.",
            (Self::Es, M::NotFound) => "Registro no encontrado.",
            (Self::En, M::NotFound) => "Record not found.",

            (Self::Pt, M::Conflict) => "Esta ação já foi realizada ou não é mais válida.",
            (Self::Es, M::Conflict) => "Esta acción ya fue realizada o ya no es válida.",
            (Self::En, M::Conflict) => "This action was already done or is no longer valid.",

            (Self::Pt, M::RequiredFields) => "Preencha todos os campos obrigatórios.",
            (Self::Es, M::RequiredFields) => "Completa todos los campos obligatorios.",
            (Self::En, M::RequiredFields) => "Please fill in all required fields.",

            (Self::Pt, M::OutOfRange) => "Valor fora do intervalo permitido.",
            (Self::Es, M::OutOfRange) => "Valor fuera del rango permitido.",
            (Self::En, M::OutOfRange) => "Value out of the allowed range.",

            (Self::Pt, M::RejectionNotesRequired) => "Informe as observações para recusar a tarefa.",
            (Self::Es, M::RejectionNotesRequired) => "Indica las observaciones para rechazar la tarea.",
            (Self::En, M::RejectionNotesRequired) => "Notes are required to reject a task.",

            (Self::Pt, M::PhotoRequired) => "Por favor, adicione pelo menos uma foto antes de enviar para revisão.",
            (Self::Es, M::PhotoRequired) => "Por favor, agrega al menos una foto antes de enviar a revisión.",
            (Self::En, M::PhotoRequired) => "Please add at least one photo before submitting for review.",

            (Self::Pt, M::InvalidEmail) => "Email inválido.",
            (Self::Es, M::InvalidEmail) => "Email inválido.",
            (Self::En, M::InvalidEmail) => "Invalid email.",

            (Self::Pt, M::PasswordTooShort) => "A senha deve ter pelo menos 6 caracteres.",
            (Self::Es, M::PasswordTooShort) => "La contraseña debe tener al menos 6 caracteres.",
            (Self::En, M::PasswordTooShort) => "Password must be at least 6 characters.",

            (Self::Pt, M::EmailTaken) => "Este email já está cadastrado.",
            (Self::Es, M::EmailTaken) => "Este email ya está registrado.",
            (Self::En, M::EmailTaken) => "This email is already registered.",

            (Self::Pt, M::AlreadyCheckedIn) => "Você já registrou entrada em uma obra.",
            (Self::Es, M::AlreadyCheckedIn) => "Ya registraste tu entrada en una obra.",
            (Self::En, M::AlreadyCheckedIn) => "You are already checked in.",

            (Self::Pt, M::NoActiveCheckIn) => "Nenhuma entrada ativa encontrada.",
            (Self::Es, M::NoActiveCheckIn) => "No hay ninguna entrada activa.",
            (Self::En, M::NoActiveCheckIn) => "No active check-in found.",

            (Self::Pt, M::InvalidTransition) => "A tarefa não pode passar para este status.",
            (Self::Es, M::InvalidTransition) => "La tarea no puede pasar a este estado.",
            (Self::En, M::InvalidTransition) => "The task cannot move to this status.",

            (Self::Pt, M::UploadRejected) => "Erro ao fazer upload da foto.",
            (Self::Es, M::UploadRejected) => "Error al subir la foto.",
            (Self::En, M::UploadRejected) => "Photo upload failed.",

            (Self::Pt, M::Internal) => "Algo deu errado. Tente novamente.",
            (Self::Es, M::Internal) => "Algo salió mal. Inténtalo de nuevo.",
            (Self::En, M::Internal) => "Something went wrong. Please try again.",
        }
    }

    /// Render a notification into `(title, message)`.
    #[must_use]
    pub fn notification(self, template: &NotificationText<'_>) -> (String, String) {
        use NotificationText as N;
        match (self, template) {
            (Self::Pt, N::TaskAssigned { title }) => {
                ("Nova Tarefa Atribuída".into(), format!("Você recebeu uma nova tarefa: {title}"))
            }
            (Self::Es, N::TaskAssigned { title }) => {
                ("Nueva Tarea Asignada".into(), format!("Recibiste una nueva tarea: {title}"))
            }
            (Self::En, N::TaskAssigned { title }) => ("New Task Assigned".into(), format!("You have a new task: {title}")),

            (Self::Pt, N::TaskApproved { title, score }) => (
                "Tarefa Aprovada!".into(),
                format!("Sua tarefa \"{title}\" foi aprovada com nota {score}/10"),
            ),
            (Self::Es, N::TaskApproved { title, score }) => (
                "¡Tarea Aprobada!".into(),
                format!("Su tarea \"{title}\" fue aprobada con nota {score}/10"),
            ),
            (Self::En, N::TaskApproved { title, score }) => (
                "Task Approved!".into(),
                format!("Your task \"{title}\" was approved with score {score}/10"),
            ),

            (Self::Pt, N::TaskRejected { title, notes }) => (
                "Tarefa Recusada".into(),
                format!("Sua tarefa \"{title}\" precisa de correções: {notes}"),
            ),
            (Self::Es, N::TaskRejected { title, notes }) => (
                "Tarea Rechazada".into(),
                format!("Su tarea \"{title}\" necesita correcciones: {notes}"),
            ),
            (Self::En, N::TaskRejected { title, notes }) => (
                "Task Rejected".into(),
                format!("Your task \"{title}\" needs corrections: {notes}"),
            ),

            (Self::Pt, N::TaskSubmitted { title }) => (
                "Tarefa Concluída".into(),
                format!("A tarefa \"{title}\" foi concluída e aguarda aprovação"),
            ),
            (Self::Es, N::TaskSubmitted { title }) => (
                "Tarea Completada".into(),
                format!("La tarea \"{title}\" fue completada y espera aprobación"),
            ),
            (Self::En, N::TaskSubmitted { title }) => (
                "Task Completed".into(),
                format!("The task \"{title}\" was completed and awaits approval"),
            ),

            (Self::Pt, N::IssueReported { reporter, title }) => {
                ("Novo Problema Reportado".into(), format!("{reporter} reportou: {title}"))
            }
            (Self::Es, N::IssueReported { reporter, title }) => {
                ("Nuevo Problema Reportado".into(), format!("{reporter} reportó: {title}"))
            }
            (Self::En, N::IssueReported { reporter, title }) => {
                ("New Issue Reported".into(), format!("{reporter} reported: {title}"))
            }
        }
    }
}

/// Keys for fixed user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    InvalidCredentials,
    AccountDisabled,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    RequiredFields,
    OutOfRange,
    RejectionNotesRequired,
    PhotoRequired,
    InvalidEmail,
    PasswordTooShort,
    EmailTaken,
    AlreadyCheckedIn,
    NoActiveCheckIn,
    InvalidTransition,
    UploadRejected,
    Internal,
}

impl Message {
    pub const ALL: [Message; 18] = [
        Message::InvalidCredentials,
        Message::AccountDisabled,
        Message::Unauthorized,
        Message::Forbidden,
        Message::NotFound,
        Message::Conflict,
        Message::RequiredFields,
        Message::OutOfRange,
        Message::RejectionNotesRequired,
        Message::PhotoRequired,
        Message::InvalidEmail,
        Message::PasswordTooShort,
        Message::EmailTaken,
        Message::AlreadyCheckedIn,
        Message::NoActiveCheckIn,
        Message::InvalidTransition,
        Message::UploadRejected,
        Message::Internal,
    ];
}

/// Parameterized notification copy.
#[derive(Debug, Clone, Copy)]
pub enum NotificationText<'a> {
    TaskAssigned { title: &'a str },
    TaskApproved { title: &'a str, score: i16 },
    TaskRejected { title: &'a str, notes: &'a str },
    TaskSubmitted { title: &'a str },
    IssueReported { reporter: &'a str, title: &'a str },
}

#[cfg(test)]
#[path = "locale_test.rs"]
mod tests;
