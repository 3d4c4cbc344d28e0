use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const RWCOPY_VOLUME_PREFIX: &str = "cocoon-rwcopy";
const RWCOPY_FILE_PREFIX: &str = "cocoon-rwcopy-file";

const COLORS: [&str; 20] = [
    "red", "blue", "green", "amber", "coral", "cyan", "gold", "ivory", "jade",
    "lime", "mauve", "olive", "peach", "plum", "ruby", "sage", "teal",
    "violet", "scarlet", "indigo",
];

const CITIES: [&str; 20] = [
    "tokyo", "paris", "london", "berlin", "oslo", "lima", "rome", "seoul",
    "delhi", "cairo", "lagos", "dublin", "milan", "zurich", "vienna",
    "prague", "lisbon", "havana", "bogota", "nairobi",
];

/// Random `{color}-{city}` sandbox name. Callers retry against the store
/// until an unused one comes up.
pub fn random_sandbox_name() -> String {
    let mut rng = rand::rng();
    let color = COLORS[rng.random_range(0..COLORS.len())];
    let city = CITIES[rng.random_range(0..CITIES.len())];
    format!("{}-{}", color, city)
}

// Last nanosecond suffix handed out. Minted names embed a strictly
// increasing value so two mounts resolved in the same instant still get
// distinct names.
static LAST_NANOS: AtomicU64 = AtomicU64::new(0);

fn next_nanos() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut prev = LAST_NANOS.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_NANOS.compare_exchange_weak(
            prev,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

fn sanitize_target(target: &str) -> String {
    let sanitized: String = target
        .trim_start_matches('/')
        .chars()
        .map(|c| match c {
            '/' | '_' | '.' => '-',
            other => other,
        })
        .collect();
    if sanitized.is_empty() {
        "root".to_string()
    } else {
        sanitized
    }
}

/// Name for the volume backing a directory rwcopy mount.
pub fn rwcopy_volume_name(sandbox: &str, target: &str) -> String {
    format!(
        "{}-{}-{}-{}",
        RWCOPY_VOLUME_PREFIX,
        sandbox,
        sanitize_target(target),
        next_nanos()
    )
}

/// Name for the host copy directory backing a file rwcopy mount.
pub fn rwcopy_file_mount_name(sandbox: &str, target: &str) -> String {
    format!(
        "{}-{}-{}-{}",
        RWCOPY_FILE_PREFIX,
        sandbox,
        sanitize_target(target),
        next_nanos()
    )
}
