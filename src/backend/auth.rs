//! Single-user auth for local use.

use crate::client::{AuthApi, User};
use crate::error::RemoteError;
use crate::utils::generate_id;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// One local user, signed in from the start.
pub struct LocalAuth {
    user: User,
    signed_in: AtomicBool,
}

impl LocalAuth {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            user: User {
                uuid: generate_id(),
                username: username.into(),
            },
            signed_in: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl AuthApi for LocalAuth {
    async fn is_signed_in(&self) -> Result<bool, RemoteError> {
        Ok(self.signed_in.load(Ordering::SeqCst))
    }

    async fn get_user(&self) -> Result<User, RemoteError> {
        if self.signed_in.load(Ordering::SeqCst) {
            Ok(self.user.clone())
        } else {
            Err(RemoteError::Rejected("Not signed in".into()))
        }
    }

    async fn sign_in(&self) -> Result<(), RemoteError> {
        self.signed_in.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        self.signed_in.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_out_hides_user() {
        tokio_test::block_on(async {
            let auth = LocalAuth::new("jane");
            assert!(auth.is_signed_in().await.unwrap());
            assert_eq!(auth.get_user().await.unwrap().username, "jane");

            auth.sign_out().await.unwrap();
            assert!(!auth.is_signed_in().await.unwrap());
            assert!(auth.get_user().await.is_err());

            auth.sign_in().await.unwrap();
            assert!(auth.get_user().await.is_ok());
        });
    }
}
