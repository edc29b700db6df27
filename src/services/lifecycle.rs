// ============================================================================
// SERVICE : CYCLE DE VIE DES COMPTES
// ============================================================================
//
// Description:
//   Machine à états du statut d'un compte. Toute écriture de users.status
//   passe par ici.
//
//     pending ──activation──► active
//     pending | active ──admin──► inactive | banned | reject
//     inactive | banned | reject ──admin "active"──► active (ou pending si
//                                                     jamais vérifié)
//
// Points d'attention:
//   - Les écritures sont conditionnelles (UPDATE ... WHERE status = <lu>) :
//     deux activations concurrentes => une seule réussit, l'autre voit
//     "already activated".
//   - is_active suit toujours status == active.
//
// ============================================================================

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::users::{self, AccountStatus, Entity as Users};
use crate::services::token_service::{TokenService, new_session_secret};
use crate::utils::uid::decode_uid;

pub const INVALID_ACTIVATION_LINK: &str = "Activation link is invalid.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Jeton d'activation vérifié
    Activate,
    /// Suspension administrative vers inactive / banned / reject
    Restrict(AccountStatus),
    /// Levée de suspension par un admin
    Reinstate,
}

impl LifecycleEvent {
    /// Statut visé, utilisé dans les messages d'erreur
    fn target(self) -> AccountStatus {
        match self {
            LifecycleEvent::Activate | LifecycleEvent::Reinstate => AccountStatus::Active,
            LifecycleEvent::Restrict(target) => target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(AccountStatus),
    AlreadyActive,
}

/// Table de transitions. Une transition absente est une erreur de validation.
pub fn next_status(
    current: AccountStatus,
    verified: bool,
    event: LifecycleEvent,
) -> Result<Transition> {
    use AccountStatus::*;

    let next = match (current, event) {
        (Pending, LifecycleEvent::Activate) => Transition::To(Active),
        (Active, LifecycleEvent::Activate) => Transition::AlreadyActive,

        (Pending | Active, LifecycleEvent::Restrict(target @ (Inactive | Banned | Reject))) => {
            Transition::To(target)
        }

        (Inactive | Banned | Reject, LifecycleEvent::Reinstate) if verified => Transition::To(Active),
        (Inactive | Banned | Reject, LifecycleEvent::Reinstate) => Transition::To(Pending),

        (from, event) => {
            return Err(AppError::field(
                "status",
                format!("Cannot change status from {} to {}.", from, event.target()),
            ));
        }
    };

    Ok(next)
}

/// Statut demandé par un admin => événement. "pending" n'est pas une cible.
pub fn admin_event(target: &str) -> Result<LifecycleEvent> {
    let target = target
        .trim()
        .to_lowercase()
        .parse::<AccountStatus>()
        .map_err(|msg| AppError::field("status", msg))?;

    match target {
        AccountStatus::Active => Ok(LifecycleEvent::Reinstate),
        AccountStatus::Pending => Err(AppError::field(
            "status",
            "Accounts cannot be moved back to pending.",
        )),
        restricted => Ok(LifecycleEvent::Restrict(restricted)),
    }
}

#[derive(Debug)]
pub enum ActivationOutcome {
    Activated(users::Model),
    AlreadyActivated,
}

#[derive(Clone)]
pub struct LifecycleManager {
    db: DatabaseConnection,
    tokens: Arc<TokenService>,
}

impl LifecycleManager {
    pub fn new(db: DatabaseConnection, tokens: Arc<TokenService>) -> Self {
        Self { db, tokens }
    }

    /// Consomme un lien d'activation (uidb64 + jeton)
    pub async fn activate(&self, uidb64: &str, token: &str) -> Result<ActivationOutcome> {
        let invalid = || AppError::InvalidLink(INVALID_ACTIVATION_LINK.to_string());

        let account_id = decode_uid(uidb64).ok_or_else(invalid)?;
        let account = Users::find_by_id(account_id)
            .one(&self.db)
            .await?
            .ok_or_else(invalid)?;

        // Email déjà vérifié : le lien est consommé, quel que soit le statut actuel
        if account.is_verified() {
            return Ok(ActivationOutcome::AlreadyActivated);
        }

        match next_status(account.status, account.is_verified(), LifecycleEvent::Activate) {
            Ok(Transition::AlreadyActive) => return Ok(ActivationOutcome::AlreadyActivated),
            Ok(Transition::To(_)) => {}
            Err(_) => return Err(invalid()),
        }

        if !self.tokens.verify_activation_token(&account, token) {
            warn!(user_id = account.id, "activation token rejected");
            return Err(invalid());
        }

        let now = Utc::now();
        let updated = Users::update_many()
            .col_expr(users::Column::Status, Expr::value(AccountStatus::Active.as_str()))
            .col_expr(users::Column::IsActive, Expr::value(true))
            .col_expr(users::Column::EmailVerifiedAt, Expr::value(now))
            .col_expr(users::Column::SessionSecret, Expr::value(new_session_secret()))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(account.id))
            .filter(users::Column::Status.eq(AccountStatus::Pending))
            .exec(&self.db)
            .await?;

        // Une autre requête a activé le compte entre la lecture et l'écriture
        if updated.rows_affected == 0 {
            return Ok(ActivationOutcome::AlreadyActivated);
        }

        info!(user_id = account.id, role = %account.role, "account activated");

        let account = self.reload(account.id).await?;
        Ok(ActivationOutcome::Activated(account))
    }

    /// Changement de statut administratif (l'appelant a déjà vérifié les droits)
    pub async fn apply_admin_status(
        &self,
        account: &users::Model,
        event: LifecycleEvent,
    ) -> Result<users::Model> {
        let target = match next_status(account.status, account.is_verified(), event)? {
            Transition::To(target) => target,
            Transition::AlreadyActive => return Ok(account.clone()),
        };

        let updated = Users::update_many()
            .col_expr(users::Column::Status, Expr::value(target.as_str()))
            .col_expr(users::Column::IsActive, Expr::value(target == AccountStatus::Active))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(account.id))
            .filter(users::Column::Status.eq(account.status))
            .exec(&self.db)
            .await?;

        if updated.rows_affected == 0 {
            return Err(AppError::Conflict(
                "Account status was changed by another request, please retry.".to_string(),
            ));
        }

        info!(
            user_id = account.id,
            from = %account.status,
            status = %target,
            "account status changed"
        );

        self.reload(account.id).await
    }

    async fn reload(&self, account_id: i32) -> Result<users::Model> {
        Users::find_by_id(account_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestContext, insert_account};
    use crate::models::users::Role;
    use crate::utils::uid::encode_uid;

    #[test]
    fn test_transition_table() {
        use AccountStatus::*;

        assert_eq!(
            next_status(Pending, false, LifecycleEvent::Activate).unwrap(),
            Transition::To(Active)
        );
        assert_eq!(
            next_status(Active, true, LifecycleEvent::Activate).unwrap(),
            Transition::AlreadyActive
        );
        assert!(next_status(Banned, true, LifecycleEvent::Activate).is_err());

        for target in [Inactive, Banned, Reject] {
            assert_eq!(
                next_status(Pending, false, LifecycleEvent::Restrict(target)).unwrap(),
                Transition::To(target)
            );
            assert_eq!(
                next_status(Active, true, LifecycleEvent::Restrict(target)).unwrap(),
                Transition::To(target)
            );
        }
        assert!(next_status(Banned, true, LifecycleEvent::Restrict(Reject)).is_err());
        assert!(next_status(Active, true, LifecycleEvent::Restrict(Pending)).is_err());
    }

    #[test]
    fn test_reinstate_depends_on_verification() {
        use AccountStatus::*;

        assert_eq!(
            next_status(Banned, true, LifecycleEvent::Reinstate).unwrap(),
            Transition::To(Active)
        );
        assert_eq!(
            next_status(Reject, false, LifecycleEvent::Reinstate).unwrap(),
            Transition::To(Pending)
        );
        assert!(next_status(Active, true, LifecycleEvent::Reinstate).is_err());
    }

    #[test]
    fn test_rejected_transition_message() {
        use AccountStatus::*;

        let cases = [
            (Banned, LifecycleEvent::Restrict(Reject), "status: Cannot change status from banned to reject."),
            (Active, LifecycleEvent::Reinstate, "status: Cannot change status from active to active."),
            (Inactive, LifecycleEvent::Activate, "status: Cannot change status from inactive to active."),
        ];
        for (from, event, expected) in cases {
            match next_status(from, true, event) {
                Err(AppError::Validation(msg)) => assert_eq!(msg, expected),
                other => panic!("expected validation error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_admin_event() {
        assert_eq!(admin_event("Banned").unwrap(), LifecycleEvent::Restrict(AccountStatus::Banned));
        assert_eq!(admin_event("active").unwrap(), LifecycleEvent::Reinstate);
        assert!(admin_event("pending").is_err());
        assert!(admin_event("deleted").is_err());
    }

    #[tokio::test]
    async fn test_activation_and_replay() {
        let ctx = TestContext::new().await;
        let account = insert_account(&ctx.db, "rider@example.com", Role::Rider, AccountStatus::Pending).await;
        let token = ctx.services.tokens.issue_activation_token(&account);
        let uid = encode_uid(account.id);

        let activated = match ctx.services.lifecycle.activate(&uid, &token).await.unwrap() {
            ActivationOutcome::Activated(model) => model,
            other => panic!("expected activation, got {:?}", other),
        };
        assert_eq!(activated.status, AccountStatus::Active);
        assert!(activated.is_active);
        assert_ne!(activated.session_secret, account.session_secret);
        let verified_at = activated.email_verified_at.unwrap();

        let replay = ctx.services.lifecycle.activate(&uid, &token).await.unwrap();
        assert!(matches!(replay, ActivationOutcome::AlreadyActivated));

        let stored = Users::find_by_id(account.id).one(&ctx.db).await.unwrap().unwrap();
        assert_eq!(stored.email_verified_at, Some(verified_at));
    }

    #[tokio::test]
    async fn test_replay_after_suspension() {
        let ctx = TestContext::new().await;
        let account = insert_account(&ctx.db, "late@example.com", Role::Rider, AccountStatus::Pending).await;
        let token = ctx.services.tokens.issue_activation_token(&account);
        let uid = encode_uid(account.id);

        let activated = match ctx.services.lifecycle.activate(&uid, &token).await.unwrap() {
            ActivationOutcome::Activated(model) => model,
            other => panic!("expected activation, got {:?}", other),
        };
        let suspended = ctx
            .services
            .lifecycle
            .apply_admin_status(&activated, LifecycleEvent::Restrict(AccountStatus::Inactive))
            .await
            .unwrap();

        let replay = ctx.services.lifecycle.activate(&uid, &token).await.unwrap();
        assert!(matches!(replay, ActivationOutcome::AlreadyActivated));

        let stored = Users::find_by_id(account.id).one(&ctx.db).await.unwrap().unwrap();
        assert_eq!(stored.status, AccountStatus::Inactive);
        assert_eq!(stored.email_verified_at, suspended.email_verified_at);
    }

    #[tokio::test]
    async fn test_activation_token_cannot_cross_accounts() {
        let ctx = TestContext::new().await;
        let alice = insert_account(&ctx.db, "alice@example.com", Role::Rider, AccountStatus::Pending).await;
        let bob = insert_account(&ctx.db, "bob@example.com", Role::Rider, AccountStatus::Pending).await;
        let alice_token = ctx.services.tokens.issue_activation_token(&alice);

        let err = ctx
            .services
            .lifecycle
            .activate(&encode_uid(bob.id), &alice_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidLink(_)));

        let stored = Users::find_by_id(bob.id).one(&ctx.db).await.unwrap().unwrap();
        assert_eq!(stored.status, AccountStatus::Pending);
    }

    #[tokio::test]
    async fn test_invalid_links_look_the_same() {
        let ctx = TestContext::new().await;
        let account = insert_account(&ctx.db, "x@example.com", Role::Driver, AccountStatus::Pending).await;

        let forged = ctx.services.lifecycle.activate(&encode_uid(account.id), "deadbeef").await;
        let unknown = ctx.services.lifecycle.activate(&encode_uid(9999), "deadbeef").await;
        let garbage = ctx.services.lifecycle.activate("%%%", "deadbeef").await;

        for result in [forged, unknown, garbage] {
            match result {
                Err(AppError::InvalidLink(msg)) => assert_eq!(msg, INVALID_ACTIVATION_LINK),
                other => panic!("expected invalid link, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_admin_status_round_trip() {
        let ctx = TestContext::new().await;
        let account = insert_account(&ctx.db, "d@example.com", Role::Driver, AccountStatus::Active).await;

        let banned = ctx
            .services
            .lifecycle
            .apply_admin_status(&account, LifecycleEvent::Restrict(AccountStatus::Banned))
            .await
            .unwrap();
        assert_eq!(banned.status, AccountStatus::Banned);
        assert!(!banned.is_active);

        let reinstated = ctx
            .services
            .lifecycle
            .apply_admin_status(&banned, LifecycleEvent::Reinstate)
            .await
            .unwrap();
        assert_eq!(reinstated.status, AccountStatus::Active);
        assert!(reinstated.is_active);
    }

    #[tokio::test]
    async fn test_stale_status_write_is_rejected() {
        let ctx = TestContext::new().await;
        let account = insert_account(&ctx.db, "s@example.com", Role::Rider, AccountStatus::Active).await;

        ctx.services
            .lifecycle
            .apply_admin_status(&account, LifecycleEvent::Restrict(AccountStatus::Inactive))
            .await
            .unwrap();

        // `account` porte encore l'ancien statut
        let err = ctx
            .services
            .lifecycle
            .apply_admin_status(&account, LifecycleEvent::Restrict(AccountStatus::Banned))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
