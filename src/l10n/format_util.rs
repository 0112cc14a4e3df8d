const BYTES_PER_KIB: i64 = 1 << 10;
const BYTES_PER_MIB: i64 = 1 << 20;

/// Unit sizes from the smallest up; the last unit has no upper bound.
const DURATIONS: [(i64, &str); 6] = [
    (1000, "millisecond"),
    (60, "second"),
    (60, "minute"),
    (24, "hour"),
    (365, "day"),
    (-1, "year"),
];

const COMPONENTS_TO_DISPLAY: usize = 2;

/// `93B`, `32.5KiB`, `1.2MiB`.
pub fn format_bytes(bytes: i64) -> String {
    if bytes < BYTES_PER_KIB {
        format!("{bytes}B")
    } else if bytes < BYTES_PER_MIB {
        format!("{:.1}KiB", bytes as f64 / BYTES_PER_KIB as f64)
    } else {
        format!("{:.1}MiB", bytes as f64 / BYTES_PER_MIB as f64)
    }
}

/// The two largest non-zero units, e.g. `1 minute 5 seconds`.
pub fn format_time_duration(millis: i64) -> String {
    if millis == 0 {
        return "0 seconds".to_string();
    }

    let mut components = Vec::new();
    let mut remaining = millis;
    for (quantity, name) in DURATIONS {
        if remaining <= 0 {
            break;
        }
        let mut value = remaining;
        if quantity > 0 {
            remaining /= quantity;
            value %= quantity;
        } else {
            remaining = 0;
        }
        if value == 0 {
            continue;
        }
        let plural = if value != 1 { "s" } else { "" };
        components.push(format!("{value} {name}{plural}"));
    }

    components.reverse();
    components.truncate(COMPONENTS_TO_DISPLAY);
    components.join(" ")
}

pub fn format_percentage(percent: i64) -> String {
    format!("{percent}%")
}
