use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use anyhow::Context;
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

lazy_static! {
    /// Verified against when the account does not exist, so a miss costs the
    /// same as a wrong password.
    static ref DECOY_HASH: anyhow::Result<String> = hash_password("decoy-password-never-matches");
}

/// Forces the decoy hash; errors if it could not be built.
pub fn prepare_decoy() -> anyhow::Result<()> {
    match DECOY_HASH.as_ref() {
        Ok(_) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("build decoy password hash: {e}")),
    }
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Argon2 compares digests in constant time.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("argon2 verify failed: {e}")),
    }
}

/// Hash on the blocking pool.
pub async fn hash_password_async(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("hash task panicked")?
}

/// Verify on the blocking pool. With no stored hash the decoy is checked and
/// the result is always `false`.
pub async fn verify_password_async(plain: String, hash: Option<String>) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || match hash {
        Some(h) => verify_password(&plain, &h),
        None => {
            let decoy = DECOY_HASH
                .as_ref()
                .map_err(|e| anyhow::anyhow!("decoy password hash unavailable: {e}"))?;
            if let Err(e) = verify_password(&plain, decoy) {
                error!(error = %e, "decoy password verification failed");
            }
            Ok(false)
        }
    })
    .await
    .context("verify task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("Str0ng!pw").unwrap();
        let b = hash_password("Str0ng!pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn decoy_is_a_real_argon2_hash() {
        prepare_decoy().unwrap();
        let decoy = DECOY_HASH.as_ref().unwrap();
        assert!(decoy.starts_with("$argon2"));
        assert!(!verify_password("anything", decoy).unwrap());
    }

    #[tokio::test]
    async fn missing_hash_never_verifies() {
        let ok = verify_password_async("decoy-password-never-matches".into(), None)
            .await
            .unwrap();
        assert!(!ok);
    }
}
