//! Chronologically ordered child keys, in the format the realtime store uses
//! for `push`: 8 characters of millisecond timestamp followed by 12 random
//! characters, over an alphabet whose ASCII order matches its value order.

use chrono::Utc;
use rand::Rng;

const ALPHABET: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

pub const PUSH_ID_LENGTH: usize = 20;

/// Generates push ids that sort in creation order, also within one
/// millisecond.
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    last_millis: i64,
    last_random: [u8; 12],
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        self.next_id_at(Utc::now().timestamp_millis())
    }

    pub fn next_id_at(&mut self, millis: i64) -> String {
        // Clock going backwards still must not reorder keys.
        let millis = millis.max(self.last_millis);

        if millis == self.last_millis {
            increment(&mut self.last_random);
        } else {
            let mut rng = rand::thread_rng();
            for digit in self.last_random.iter_mut() {
                *digit = rng.gen_range(0..64);
            }
            self.last_millis = millis;
        }

        let mut id = String::with_capacity(PUSH_ID_LENGTH);
        let mut time_chars = [0u8; 8];
        let mut remaining = millis.max(0) as u64;
        for slot in time_chars.iter_mut().rev() {
            *slot = ALPHABET[(remaining % 64) as usize];
            remaining /= 64;
        }
        id.extend(time_chars.iter().map(|&c| c as char));
        id.extend(self.last_random.iter().map(|&d| ALPHABET[d as usize] as char));
        id
    }
}

/// Base-64 increment of the random suffix, carrying leftwards.
fn increment(digits: &mut [u8; 12]) {
    for digit in digits.iter_mut().rev() {
        if *digit < 63 {
            *digit += 1;
            return;
        }
        *digit = 0;
    }
}
