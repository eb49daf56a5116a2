// src/diagnosis/mod.rs

pub mod detector;
pub mod flags;
pub mod outcome;
pub mod session;

use tracing::{info, info_span};
use uuid::Uuid;

use crate::directory::{DirectoryConnection, DirectoryError};

pub use detector::{DiagnosticPolicy, PolicyError, MAX_ATTEMPTS_COUNT};
pub use flags::{AccountControl, UacFlags, ACCOUNT_DISABLED, PASSWORD_NEVER_EXPIRES};
pub use outcome::{AuthenticationOutcome, LoginFailure};
pub use session::{Begin, BindRecorded, Credentials, DiagnosticSession};

/// Выяснить, чем закончится вход с данными учётными данными и почему.
///
/// Выполняет поиск, одну попытку входа и (только при отказе) одно повторное
/// чтение. Ошибки каталога возвращаются как есть.
pub fn diagnose<C>(
    conn: &mut C,
    credentials: &Credentials,
    policy: &DiagnosticPolicy,
) -> Result<AuthenticationOutcome, DirectoryError>
where
    C: DirectoryConnection + ?Sized,
{
    let session_id = Uuid::new_v4();
    let span = info_span!("diagnose", %session_id, username = %credentials.username());
    let _guard = span.enter();

    let session = match DiagnosticSession::begin_diagnosis(conn, credentials, policy)? {
        Begin::NotFound(outcome) => {
            info!(outcome = outcome.code(), "diagnosis finished");
            return Ok(outcome);
        }
        Begin::Ready(session) => session,
    };

    let succeeded = conn.bind(session.filter(), credentials.password())?;
    let outcome = session.record_bind_result(succeeded).conclude_diagnosis(conn)?;

    info!(outcome = outcome.code(), "diagnosis finished");
    Ok(outcome)
}
