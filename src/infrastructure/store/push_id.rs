//! Chronologically sortable push keys
//!
//! A key is 20 characters: 8 encoding the millisecond timestamp followed by
//! 12 random characters, all drawn from an alphabet whose ASCII order matches
//! its digit order. Keys generated in the same millisecond reuse the previous
//! random part incremented by one, so keys from one generator are strictly
//! increasing.

use rand::Rng;
use std::sync::Mutex;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

#[derive(Debug, Default)]
struct GeneratorState {
    last_millis: i64,
    last_random: [u8; RANDOM_CHARS],
}

#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<GeneratorState>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self) -> String {
        self.generate_at(chrono::Utc::now().timestamp_millis())
    }

    /// Generate a key for the given wall-clock time. A time earlier than the
    /// previous one is treated as the previous one so order still holds.
    pub fn generate_at(&self, now_millis: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if now_millis > state.last_millis {
            let mut rng = rand::thread_rng();
            for digit in state.last_random.iter_mut() {
                *digit = rng.gen_range(0..64);
            }
            state.last_millis = now_millis;
        } else {
            increment(&mut state.last_random);
        }

        let mut key = String::with_capacity(TIME_CHARS + RANDOM_CHARS);
        let mut time_digits = [0u8; TIME_CHARS];
        let mut remaining = state.last_millis.max(0) as u64;
        for slot in time_digits.iter_mut().rev() {
            *slot = (remaining % 64) as u8;
            remaining /= 64;
        }

        for digit in time_digits.iter().chain(state.last_random.iter()) {
            key.push(PUSH_CHARS[*digit as usize] as char);
        }
        key
    }
}

/// Add one to a base-64 digit array, carrying leftwards. On overflow of all
/// digits the array wraps to zero.
fn increment(digits: &mut [u8; RANDOM_CHARS]) {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}
