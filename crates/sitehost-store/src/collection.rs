//! # Collections
//!
//! Every collection is one JSON document at a fixed path. A
//! [`CollectionKey`] binds that path to its record type and to the value a
//! missing document stands for.
//!
//! Two write styles exist:
//!
//! - [`Store::save_collection`] replaces the document wholesale
//!   (last writer wins). Used where the caller supplies the whole value, such
//!   as an administrator saving the plan table.
//! - [`Store::update_collection`] is a compare-and-swap cycle: fetch the
//!   document with its token (uncached), apply the mutation, write back with
//!   that token. A conflict means someone else wrote in between; the cycle
//!   restarts from a fresh read, up to `cas_max_attempts` times.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sitehost_content_client::{ContentApi, ContentStoreError, Fetched};
use sitehost_core::records::{PaymentMethod, PaymentRequest, PlanTable, ProjectRecord, UserRecord};
use sitehost_core::Clock;
use tracing::warn;

use crate::error::StoreError;
use crate::Store;

/// A JSON collection: where it lives and what its absence means.
pub struct CollectionKey<T> {
    pub path: &'static str,
    default: fn() -> T,
}

impl<T> CollectionKey<T> {
    pub const fn new(path: &'static str, default: fn() -> T) -> Self {
        Self { path, default }
    }

    /// The value a missing document stands for.
    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

impl<T> Clone for CollectionKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CollectionKey<T> {}

impl<T> std::fmt::Debug for CollectionKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionKey").field("path", &self.path).finish()
    }
}

pub const USERS: CollectionKey<Vec<UserRecord>> =
    CollectionKey::new("database/users.json", Vec::new);
pub const PROJECTS: CollectionKey<Vec<ProjectRecord>> =
    CollectionKey::new("database/projects.json", Vec::new);
pub const PLANS: CollectionKey<PlanTable> =
    CollectionKey::new("database/plans.json", PlanTable::default);
pub const PAYMENTS: CollectionKey<Vec<PaymentRequest>> =
    CollectionKey::new("database/payments.json", Vec::new);
pub const PAYMENT_METHODS: CollectionKey<Vec<PaymentMethod>> =
    CollectionKey::new("database/settings.json", Vec::new);

/// What a mutation decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<R> {
    /// Write the mutated document back, then return `R`.
    Commit(R),
    /// Leave the document as it is and return `R`.
    Skip(R),
}

impl<A: ContentApi, C: Clock> Store<A, C> {
    /// Read a collection through the cache. A missing (or `null`) document
    /// yields the key's default; a transport failure is an error.
    pub async fn load_collection<T: DeserializeOwned>(
        &self,
        key: &CollectionKey<T>,
    ) -> Result<T, StoreError> {
        let decode_err = |source| StoreError::Decode {
            path: key.path.to_string(),
            source,
        };
        match self.cached().read(key.path).await? {
            Fetched::NotFound | Fetched::Json(serde_json::Value::Null) => Ok(key.default_value()),
            Fetched::Json(value) => serde_json::from_value(value).map_err(decode_err),
            Fetched::Text(text) if text.trim().is_empty() => Ok(key.default_value()),
            Fetched::Text(text) => serde_json::from_str(&text).map_err(decode_err),
            Fetched::Directory(_) => Err(ContentStoreError::NotAFile {
                path: key.path.to_string(),
            }
            .into()),
        }
    }

    /// Replace a collection wholesale. Last writer wins.
    pub async fn save_collection<T: Serialize>(
        &self,
        key: &CollectionKey<T>,
        value: &T,
        label: &str,
    ) -> Result<(), StoreError> {
        let bytes = encode(key, value)?;
        self.cached().put(key.path, &bytes, label).await?;
        Ok(())
    }

    /// Compare-and-swap read-modify-write of a collection.
    ///
    /// `mutate` may run several times, each time on a freshly read document,
    /// so it must not have side effects beyond the document it is given.
    /// Business-rule errors it returns abort the update without writing.
    pub async fn update_collection<T, R, F>(
        &self,
        key: &CollectionKey<T>,
        label: &str,
        mut mutate: F,
    ) -> Result<R, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T) -> Result<Mutation<R>, StoreError>,
    {
        let attempts = self.config().cas_max_attempts.max(1);
        for attempt in 1..=attempts {
            let (mut value, token) = match self.cached().fetch_object(key.path).await? {
                Some(obj) => (decode_bytes(key, &obj.bytes)?, Some(obj.token)),
                None => (key.default_value(), None),
            };

            let result = match mutate(&mut value)? {
                Mutation::Skip(result) => return Ok(result),
                Mutation::Commit(result) => result,
            };

            let bytes = encode(key, &value)?;
            match self
                .cached()
                .put_with_token(key.path, &bytes, label, token.as_ref())
                .await
            {
                Ok(_) => return Ok(result),
                Err(e) if e.is_conflict() => {
                    warn!(path = key.path, attempt, attempts, "concurrent update, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Contention {
            path: key.path.to_string(),
            attempts,
        })
    }
}

fn decode_bytes<T: DeserializeOwned>(key: &CollectionKey<T>, bytes: &[u8]) -> Result<T, StoreError> {
    if matches!(std::str::from_utf8(bytes).map(str::trim), Ok("" | "null")) {
        return Ok(key.default_value());
    }
    serde_json::from_slice(bytes).map_err(|source| StoreError::Decode {
        path: key.path.to_string(),
        source,
    })
}

fn encode<T: Serialize>(key: &CollectionKey<T>, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        path: key.path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, Fixture};
    use serde_json::json;

    #[tokio::test]
    async fn missing_collection_is_default() {
        let Fixture { store, .. } = fixture();
        assert!(store.load_collection(&USERS).await.unwrap().is_empty());
        assert_eq!(
            store.load_collection(&PLANS).await.unwrap(),
            PlanTable::default()
        );
    }

    #[tokio::test]
    async fn null_document_is_default() {
        let Fixture { store, api, .. } = fixture();
        api.seed(PROJECTS.path, "null");
        assert!(store.load_collection(&PROJECTS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_collection_is_a_decode_error() {
        let Fixture { store, api, .. } = fixture();
        api.seed(USERS.path, "<html>oops</html>");
        let err = store.load_collection(&USERS).await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[tokio::test]
    async fn transport_failure_is_not_an_empty_collection() {
        let Fixture { store, api, .. } = fixture();
        api.seed_json(USERS.path, &json!([{"username": "a"}]));
        api.set_unavailable(true);
        let err = store.load_collection(&USERS).await.unwrap_err();
        assert!(matches!(err, StoreError::Content(_)));
    }

    #[tokio::test]
    async fn save_is_pretty_printed() {
        let Fixture { store, api, .. } = fixture();
        store
            .save_collection(&PAYMENT_METHODS, &Vec::new(), "init")
            .await
            .unwrap();
        let methods = vec![PaymentMethod {
            id: 1,
            provider: "bKash".into(),
            number: "017".into(),
            extra: Default::default(),
        }];
        store
            .save_collection(&PAYMENT_METHODS, &methods, "add")
            .await
            .unwrap();
        let text = api.text(PAYMENT_METHODS.path).unwrap();
        assert!(text.contains("\n  {\n    \"id\": 1,"));
    }

    #[tokio::test]
    async fn update_retries_after_interleaved_write() {
        let Fixture { store, api, .. } = fixture();
        api.seed_json(PAYMENT_METHODS.path, &json!([]));
        api.interleave_write(
            PAYMENT_METHODS.path,
            json!([{"id": 7, "provider": "Nagad", "number": "018"}]).to_string(),
        );

        let mut runs = 0;
        store
            .update_collection(&PAYMENT_METHODS, "add", |methods| {
                runs += 1;
                methods.push(PaymentMethod {
                    id: 8,
                    provider: "bKash".into(),
                    number: "017".into(),
                    extra: Default::default(),
                });
                Ok(Mutation::Commit(()))
            })
            .await
            .unwrap();

        assert_eq!(runs, 2);
        let stored = api.json(PAYMENT_METHODS.path).unwrap();
        let ids: Vec<i64> = stored
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![7, 8], "the foreign write must survive");
    }

    #[tokio::test]
    async fn update_gives_up_after_max_attempts() {
        let Fixture { store, api, .. } = fixture();
        api.seed_json(PAYMENTS.path, &json!([]));

        let mut runs = 0u32;
        let err = store
            .update_collection(&PAYMENTS, "contend", |_payments| {
                runs += 1;
                // Another writer commits before every one of our writes.
                api.interleave_write(PAYMENTS.path, format!("[] {}", " ".repeat(runs as usize)));
                Ok(Mutation::Commit(()))
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Contention { attempts: 3, .. }
        ));
        assert_eq!(runs, 3);
    }

    #[tokio::test]
    async fn skip_does_not_write() {
        let Fixture { store, api, .. } = fixture();
        let out = store
            .update_collection(&PROJECTS, "noop", |_projects| Ok(Mutation::Skip(42)))
            .await
            .unwrap();
        assert_eq!(out, 42);
        assert_eq!(api.put_calls(), 0);
    }

    #[tokio::test]
    async fn rejection_aborts_without_writing() {
        let Fixture { store, api, .. } = fixture();
        let err = store
            .update_collection(&PROJECTS, "nope", |_projects| -> Result<Mutation<()>, _> {
                Err(StoreError::rejected("no"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert_eq!(api.put_calls(), 0);
    }
}
