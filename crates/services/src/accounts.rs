//! # Account workflows
//!
//! Registration and activation around the invitation ledger, plus the
//! cache-aside read path for account lookups.
//!
//! Cache invalidation always runs after the store call has returned, which
//! for the transactional operations means after commit. Invalidating first
//! would let a concurrent reader repopulate the cache with the pre-commit row.

use std::sync::Arc;

use chrono::{Duration, Utc};
use domains::{
    Account, AccountCache, AccountId, AccountRepo, DomainError, InvitationNotice,
    InvitationNotifier, NewAccount, NewInvitation, PasswordHasher, Result, Role, RoleRepo,
};
use tracing::{error, info, warn};

use crate::authorization::require_role;
use crate::utils::{generate_token, hash_token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Outcome of a registration: the pending account and the plaintext token
/// that was handed to the notifier.
#[derive(Debug, Clone)]
pub struct Registration {
    pub account: Account,
    pub activation_token: String,
}

#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepo>,
    roles: Arc<dyn RoleRepo>,
    cache: Arc<dyn AccountCache>,
    hasher: Arc<dyn PasswordHasher>,
    notifier: Arc<dyn InvitationNotifier>,
    invitation_ttl: Duration,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountRepo>,
        roles: Arc<dyn RoleRepo>,
        cache: Arc<dyn AccountCache>,
        hasher: Arc<dyn PasswordHasher>,
        notifier: Arc<dyn InvitationNotifier>,
        invitation_ttl: Duration,
    ) -> Self {
        Self {
            accounts,
            roles,
            cache,
            hasher,
            notifier,
            invitation_ttl,
        }
    }

    /// Creates an inactive account together with its invitation.
    ///
    /// The notifier runs after the transaction has committed; a delivery
    /// failure is logged and the registration stands.
    pub async fn register(&self, input: RegisterAccount) -> Result<Registration> {
        let password_hash = self.hasher.hash(&input.password).await?;
        let token = generate_token();

        let account = self
            .accounts
            .create_and_invite(
                NewAccount {
                    username: input.username,
                    email: input.email,
                    password_hash,
                    role_name: Role::USER.to_string(),
                },
                NewInvitation {
                    token_hash: hash_token(&token),
                    expires_at: Utc::now() + self.invitation_ttl,
                },
            )
            .await?;

        info!(account_id = account.id, "account registered, pending activation");

        let notice = InvitationNotice {
            account_id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            token: token.clone(),
        };
        if let Err(err) = self.notifier.notify(&notice).await {
            warn!(account_id = account.id, error = %err, "invitation delivery failed");
        }

        Ok(Registration {
            account,
            activation_token: token,
        })
    }

    /// Consumes an invitation token. Unknown, expired and already-used tokens
    /// all fail with `NotFound`.
    pub async fn activate(&self, token: &str) -> Result<Account> {
        let account = self
            .accounts
            .activate(&hash_token(token), Utc::now())
            .await?;

        self.evict(account.id).await;
        info!(account_id = account.id, "account activated");
        Ok(account)
    }

    /// Cache-aside lookup of an active account.
    pub async fn get_account(&self, id: AccountId) -> Result<Account> {
        match self.cache.get(id).await {
            Ok(Some(account)) => return Ok(account),
            Ok(None) => {}
            Err(err) => {
                warn!(account_id = id, error = %err, "account cache read failed, using store");
            }
        }

        let account = self.accounts.get_by_id(id).await?;

        if let Err(err) = self.cache.set(&account).await {
            warn!(account_id = id, error = %err, "account cache fill skipped");
        }
        Ok(account)
    }

    /// Checks an email/password pair. Both an unknown email and a wrong
    /// password read as the same `Unauthorized`.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Account> {
        let account = match self.accounts.get_by_email(email).await {
            Ok(account) => account,
            Err(DomainError::NotFound(_)) => {
                return Err(DomainError::Unauthorized("invalid credentials".into()))
            }
            Err(err) => return Err(err),
        };

        if !self.hasher.verify(password, &account.password_hash).await {
            return Err(DomainError::Unauthorized("invalid credentials".into()));
        }
        Ok(account)
    }

    /// Administrative removal of an account.
    pub async fn delete_account(&self, actor: &Account, id: AccountId) -> Result<()> {
        require_role(self.roles.as_ref(), actor, Role::ADMIN).await?;
        self.accounts.delete(id).await?;
        self.evict(id).await;
        info!(account_id = id, actor_id = actor.id, "account deleted");
        Ok(())
    }

    async fn evict(&self, id: AccountId) {
        // A failed eviction leaves a stale entry until its TTL runs out.
        if let Err(err) = self.cache.invalidate(id).await {
            error!(account_id = id, error = %err, "account cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::fixtures::{account, account_with_role, role};
    use domains::{
        CacheError, MockAccountCache, MockAccountRepo, MockInvitationNotifier,
        MockPasswordHasher, MockRoleRepo,
    };
    use mockall::{predicate::eq, Sequence};

    struct Mocks {
        accounts: MockAccountRepo,
        roles: MockRoleRepo,
        cache: MockAccountCache,
        hasher: MockPasswordHasher,
        notifier: MockInvitationNotifier,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                accounts: MockAccountRepo::new(),
                roles: MockRoleRepo::new(),
                cache: MockAccountCache::new(),
                hasher: MockPasswordHasher::new(),
                notifier: MockInvitationNotifier::new(),
            }
        }

        fn into_service(self) -> AccountService {
            AccountService::new(
                Arc::new(self.accounts),
                Arc::new(self.roles),
                Arc::new(self.cache),
                Arc::new(self.hasher),
                Arc::new(self.notifier),
                Duration::hours(72),
            )
        }
    }

    fn registration_input() -> RegisterAccount {
        RegisterAccount {
            username: "ferris".into(),
            email: "ferris@example.com".into(),
            password: "hunter22".into(),
        }
    }

    #[tokio::test]
    async fn register_persists_only_hashes() {
        let mut mocks = Mocks::new();
        let seen_hash = Arc::new(Mutex::new(None::<String>));

        mocks
            .hasher
            .expect_hash()
            .withf(|plain| plain == "hunter22")
            .returning(|_| Ok("argon-hash".into()));

        let seen = seen_hash.clone();
        mocks
            .accounts
            .expect_create_and_invite()
            .withf(|new, inv| {
                new.password_hash == "argon-hash"
                    && new.role_name == Role::USER
                    && inv.expires_at > Utc::now() + Duration::hours(71)
            })
            .times(1)
            .returning(move |new, inv| {
                *seen.lock().unwrap() = Some(inv.token_hash.clone());
                let mut created = account(11);
                created.username = new.username;
                created.is_active = false;
                Ok(created)
            });
        mocks.notifier.expect_notify().times(1).returning(|_| Ok(()));

        let registration = mocks.into_service().register(registration_input()).await.unwrap();

        let stored = seen_hash.lock().unwrap().clone().unwrap();
        assert_ne!(stored, registration.activation_token);
        assert_eq!(stored, hash_token(&registration.activation_token));
        assert!(!registration.account.is_active);
    }

    #[tokio::test]
    async fn notifier_failure_does_not_undo_registration() {
        let mut mocks = Mocks::new();
        mocks.hasher.expect_hash().returning(|_| Ok("h".into()));
        mocks
            .accounts
            .expect_create_and_invite()
            .returning(|_, _| Ok(account(3)));
        mocks
            .notifier
            .expect_notify()
            .returning(|_| Err(DomainError::internal("smtp down")));
        mocks.accounts.expect_delete().never();

        let registration = mocks.into_service().register(registration_input()).await;
        assert!(registration.is_ok());
    }

    #[tokio::test]
    async fn duplicate_kinds_propagate_and_skip_notification() {
        let mut mocks = Mocks::new();
        mocks.hasher.expect_hash().returning(|_| Ok("h".into()));
        mocks
            .accounts
            .expect_create_and_invite()
            .returning(|_, _| Err(DomainError::DuplicateEmail));
        mocks.notifier.expect_notify().never();

        let err = mocks
            .into_service()
            .register(registration_input())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::DuplicateEmail);
    }

    #[tokio::test]
    async fn activation_invalidates_after_commit() {
        let mut mocks = Mocks::new();
        let mut seq = Sequence::new();
        let token = "plain-token";

        mocks
            .accounts
            .expect_activate()
            .withf(move |hash, _| hash == hash_token(token))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(account(5)));
        mocks
            .cache
            .expect_invalidate()
            .with(eq(5))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let activated = mocks.into_service().activate(token).await.unwrap();
        assert_eq!(activated.id, 5);
    }

    #[tokio::test]
    async fn failed_activation_leaves_cache_alone() {
        let mut mocks = Mocks::new();
        mocks
            .accounts
            .expect_activate()
            .returning(|_, _| Err(DomainError::NotFound("invitation")));
        mocks.cache.expect_invalidate().never();

        let err = mocks.into_service().activate("expired").await.unwrap_err();
        assert_eq!(err, DomainError::NotFound("invitation"));
    }

    #[tokio::test]
    async fn cache_hit_skips_the_store() {
        let mut mocks = Mocks::new();
        mocks
            .cache
            .expect_get()
            .with(eq(9))
            .returning(|id| Ok(Some(account(id))));
        mocks.accounts.expect_get_by_id().never();

        let found = mocks.into_service().get_account(9).await.unwrap();
        assert_eq!(found.id, 9);
    }

    #[tokio::test]
    async fn cache_miss_reads_store_then_fills() {
        let mut mocks = Mocks::new();
        let mut seq = Sequence::new();
        mocks
            .cache
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        mocks
            .accounts
            .expect_get_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id| Ok(account(id)));
        mocks
            .cache
            .expect_set()
            .withf(|a| a.id == 4)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        assert_eq!(mocks.into_service().get_account(4).await.unwrap().id, 4);
    }

    #[tokio::test]
    async fn cache_outage_degrades_to_store() {
        let mut mocks = Mocks::new();
        mocks
            .cache
            .expect_get()
            .returning(|_| Err(CacheError::Backend("connection refused".into())));
        mocks
            .cache
            .expect_set()
            .returning(|_| Err(CacheError::Backend("connection refused".into())));
        mocks
            .accounts
            .expect_get_by_id()
            .returning(|id| Ok(account(id)));

        assert!(mocks.into_service().get_account(2).await.is_ok());
    }

    #[tokio::test]
    async fn inactive_accounts_stay_invisible() {
        let mut mocks = Mocks::new();
        mocks.cache.expect_get().returning(|_| Ok(None));
        mocks
            .accounts
            .expect_get_by_id()
            .returning(|_| Err(DomainError::NotFound("account")));
        mocks.cache.expect_set().never();

        let err = mocks.into_service().get_account(2).await.unwrap_err();
        assert_eq!(err, DomainError::NotFound("account"));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_alike() {
        let mut mocks = Mocks::new();
        mocks
            .accounts
            .expect_get_by_email()
            .returning(|email| {
                if email == "known@example.com" {
                    Ok(account(1))
                } else {
                    Err(DomainError::NotFound("account"))
                }
            });
        mocks.hasher.expect_verify().returning(|_, _| false);
        let service = mocks.into_service();

        let wrong = service.authenticate("known@example.com", "nope").await.unwrap_err();
        let unknown = service.authenticate("who@example.com", "nope").await.unwrap_err();
        assert_eq!(wrong, unknown);
        assert!(matches!(wrong, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn only_admins_delete_accounts() {
        let mut mocks = Mocks::new();
        mocks
            .roles
            .expect_get_by_name()
            .returning(|_| Ok(role(Role::ADMIN, 3)));
        mocks.accounts.expect_delete().never();

        let user = account_with_role(1, Role::USER, 1);
        let err = mocks.into_service().delete_account(&user, 2).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn delete_evicts_cached_snapshot() {
        let mut mocks = Mocks::new();
        let mut seq = Sequence::new();
        mocks
            .roles
            .expect_get_by_name()
            .returning(|_| Ok(role(Role::ADMIN, 3)));
        mocks
            .accounts
            .expect_delete()
            .with(eq(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mocks
            .cache
            .expect_invalidate()
            .with(eq(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let admin = account_with_role(1, Role::ADMIN, 3);
        tokio_test::assert_ok!(mocks.into_service().delete_account(&admin, 2).await);
    }
}
