use crate::tracker::context::TabStorage;
use rand::Rng;

/// Tab storage key holding the session token.
pub const SESSION_KEY: &str = "lenda_session_id";

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const PART_LEN: usize = 13;

/// Returns the tab's session token, minting and caching one on first use.
///
/// The token only distinguishes browsing sessions for unique-visitor counts.
/// It lives as long as the tab storage does.
pub fn session_id(storage: &TabStorage) -> String {
    if let Some(existing) = storage.get_item(SESSION_KEY) {
        return existing;
    }
    let mut rng = rand::rng();
    let token = format!(
        "{}{}",
        random_base36(&mut rng, PART_LEN),
        random_base36(&mut rng, PART_LEN)
    );
    storage.set_item(SESSION_KEY, &token);
    tracing::debug!("Minted new session id");
    token
}

fn random_base36<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect()
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Idempotence: any number of requests in one tab return the first token.
        #[test]
        fn prop_session_id_idempotent(calls in 1usize..20) {
            let storage = TabStorage::new();
            let first = session_id(&storage);
            for _ in 0..calls {
                prop_assert_eq!(session_id(&storage), first.clone());
            }
        }
    }
}
