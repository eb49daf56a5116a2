// tests/memory_directory.rs

use logindiag::directory::{MemoryAccount, MemoryDirectory};
use logindiag::{diagnose, AuthenticationOutcome, Credentials, DiagnosticPolicy, LoginFailure};

const PASSWORD: &str = "P@ssw0rd123";

fn directory(policy: DiagnosticPolicy) -> MemoryDirectory {
    MemoryDirectory::new(policy)
        .with_account(MemoryAccount::new("jdoe", PASSWORD).unwrap())
        .with_account(MemoryAccount::new("disabled", PASSWORD).unwrap().with_account_control(514))
        .with_account(MemoryAccount::new("reset", PASSWORD).unwrap().with_password_set_at(None))
        .with_account(
            MemoryAccount::new("svc_backup", PASSWORD)
                .unwrap()
                .with_password_set_at(None)
                .with_account_control(512 | 65536),
        )
}

fn attempt(dir: &mut MemoryDirectory, username: &str, password: &str) -> AuthenticationOutcome {
    let credentials = Credentials::new(username, password);
    let policy = DiagnosticPolicy::default().with_lockout_threshold(3);
    diagnose(dir, &credentials, &policy).unwrap()
}

#[test]
fn correct_password_succeeds_with_single_read() {
    let mut dir = directory(DiagnosticPolicy::default());
    let outcome = attempt(&mut dir, "jdoe", PASSWORD);
    assert!(outcome.is_success());
    assert_eq!(dir.searches(), 1);
    assert_eq!(dir.binds(), 1);
}

#[test]
fn unknown_user_never_binds() {
    let mut dir = directory(DiagnosticPolicy::default());
    let outcome = attempt(&mut dir, "ghost", PASSWORD);
    assert_eq!(outcome.into_result(), Err(LoginFailure::UserNotFound("ghost".into())));
    assert_eq!(dir.binds(), 0);
}

#[test]
fn repeated_wrong_passwords_end_in_lockout() {
    let policy = DiagnosticPolicy::default().with_lockout_threshold(3);
    let mut dir = directory(policy);

    for _ in 0..3 {
        let outcome = attempt(&mut dir, "jdoe", "wrong");
        assert_eq!(outcome, AuthenticationOutcome::WrongPassword { username: "jdoe".into() });
    }
    assert_eq!(dir.account("jdoe").unwrap().failed_attempt_count, 3);

    // Счётчик на пороге больше не растёт: даже верный пароль не проходит
    let outcome = attempt(&mut dir, "jdoe", PASSWORD);
    assert_eq!(outcome, AuthenticationOutcome::AccountLockedOut { username: "jdoe".into() });
    let outcome = attempt(&mut dir, "jdoe", "wrong");
    assert_eq!(outcome, AuthenticationOutcome::AccountLockedOut { username: "jdoe".into() });
}

#[test]
fn disabled_account_with_correct_password() {
    let mut dir = directory(DiagnosticPolicy::default());
    let outcome = attempt(&mut dir, "disabled", PASSWORD);
    assert_eq!(outcome, AuthenticationOutcome::AccountDisabled { username: "disabled".into() });
    assert_eq!(dir.searches(), 2);
}

#[test]
fn disabled_account_with_wrong_password_reports_wrong_password() {
    let mut dir = directory(DiagnosticPolicy::default());
    let outcome = attempt(&mut dir, "disabled", "wrong");
    assert_eq!(outcome, AuthenticationOutcome::WrongPassword { username: "disabled".into() });
}

#[test]
fn pending_reset_reads_as_expired() {
    let mut dir = directory(DiagnosticPolicy::default());
    let outcome = attempt(&mut dir, "reset", PASSWORD);
    assert_eq!(outcome, AuthenticationOutcome::PasswordExpired { username: "reset".into() });

    let outcome = attempt(&mut dir, "svc_backup", PASSWORD);
    assert!(outcome.is_success());
}

#[test]
fn username_lookup_ignores_case() {
    let mut dir = directory(DiagnosticPolicy::default());
    let outcome = attempt(&mut dir, "JDOE", PASSWORD);
    assert_eq!(outcome, AuthenticationOutcome::Success { username: "JDOE".into() });
}

#[tokio::test]
async fn diagnosis_runs_on_blocking_pool() {
    let mut dir = directory(DiagnosticPolicy::default());
    let outcome = tokio::task::spawn_blocking(move || {
        let credentials = Credentials::new("jdoe", "wrong");
        diagnose(&mut dir, &credentials, &DiagnosticPolicy::default())
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome.code(), "wrong_password");
}
