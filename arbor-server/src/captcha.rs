use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use arbor_api::Uuid;
use rand::{distributions::Alphanumeric, Rng};

pub const CHALLENGE_TTL: Duration = Duration::from_secs(300);
const RESPONSE_LEN: usize = 6;

#[derive(Clone, Debug)]
struct Challenge {
    response: String,
    expires_at: Instant,
}

#[derive(Clone, Debug)]
pub struct Issued {
    pub key: Uuid,
    pub image_url: String,
}

/// Live CAPTCHA challenges. Each key is single-use: one verification
/// attempt consumes it whatever the outcome, and the removal happens
/// under the lock, so concurrent attempts can succeed at most once.
#[derive(Clone, Debug)]
pub struct ChallengeStore {
    image_base: Arc<String>,
    ttl: Duration,
    live: Arc<Mutex<HashMap<Uuid, Challenge>>>,
}

impl ChallengeStore {
    pub fn new(image_base: String) -> ChallengeStore {
        ChallengeStore::with_ttl(image_base, CHALLENGE_TTL)
    }

    pub fn with_ttl(image_base: String, ttl: Duration) -> ChallengeStore {
        ChallengeStore {
            image_base: Arc::new(image_base),
            ttl,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Issue a fresh challenge. The image itself is rendered by the
    /// captcha collaborator; we only hand out the URL it serves.
    pub fn issue(&self) -> Issued {
        let key = Uuid::new_v4();
        let response: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RESPONSE_LEN)
            .map(char::from)
            .collect();
        let now = Instant::now();
        let mut live = self.live.lock().expect("challenge store lock poisoned");
        live.retain(|_, c| c.expires_at > now);
        live.insert(
            key,
            Challenge {
                response,
                expires_at: now + self.ttl,
            },
        );
        Issued {
            key,
            image_url: format!("{}/{}.png", self.image_base.trim_end_matches('/'), key),
        }
    }

    /// Consume the challenge for `key`, reporting whether `value`
    /// matched (case-insensitively) before expiry.
    pub fn consume(&self, key: Uuid, value: &str) -> bool {
        let challenge = self
            .live
            .lock()
            .expect("challenge store lock poisoned")
            .remove(&key);
        match challenge {
            Some(c) => c.expires_at > Instant::now() && c.response.eq_ignore_ascii_case(value),
            None => false,
        }
    }

    #[cfg(test)]
    pub fn peek_response(&self, key: Uuid) -> Option<String> {
        self.live
            .lock()
            .expect("challenge store lock poisoned")
            .get(&key)
            .map(|c| c.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ChallengeStore {
        ChallengeStore::new(String::from("https://captcha.test/images"))
    }

    #[test]
    fn issues_image_urls_under_base() {
        let issued = store().issue();
        assert_eq!(
            issued.image_url,
            format!("https://captcha.test/images/{}.png", issued.key)
        );
    }

    #[test]
    fn consume_is_single_use() {
        let store = store();
        let issued = store.issue();
        let response = store.peek_response(issued.key).unwrap();
        assert!(store.consume(issued.key, &response));
        assert!(!store.consume(issued.key, &response));
    }

    #[test]
    fn failed_attempt_also_consumes() {
        let store = store();
        let issued = store.issue();
        let response = store.peek_response(issued.key).unwrap();
        assert!(!store.consume(issued.key, "nonsense"));
        assert!(!store.consume(issued.key, &response));
    }

    #[test]
    fn comparison_ignores_case() {
        let store = store();
        let issued = store.issue();
        let response = store.peek_response(issued.key).unwrap().to_lowercase();
        assert!(store.consume(issued.key, &response));
    }

    #[test]
    fn unknown_key_fails() {
        assert!(!store().consume(Uuid::new_v4(), "whatever"));
    }

    #[test]
    fn expired_challenge_fails() {
        let store =
            ChallengeStore::with_ttl(String::from("https://captcha.test"), Duration::ZERO);
        let issued = store.issue();
        let response = store.peek_response(issued.key).unwrap();
        assert!(!store.consume(issued.key, &response));
    }

    #[test]
    fn concurrent_attempts_succeed_at_most_once() {
        let store = store();
        let issued = store.issue();
        let response = store.peek_response(issued.key).unwrap();
        let successes = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let store = store.clone();
                    let response = response.clone();
                    s.spawn(move || store.consume(issued.key, &response))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("consume thread panicked"))
                .filter(|ok| *ok)
                .count()
        });
        assert_eq!(successes, 1);
    }
}
