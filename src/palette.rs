//! Status colours for the department chart.
//!
//! Known status labels get the dashboard's fixed colours. Any other label is
//! mapped onto a fallback palette by a SHA-256 digest of its text, so the same
//! label always gets the same colour across runs and machines.

use crate::types::StatusColor;
use sha2::{Digest, Sha256};

const KNOWN: &[(&str, StatusColor)] = &[
    ("종료", StatusColor::new(75, 192, 192, 50)),
    ("요청", StatusColor::new(255, 99, 132, 50)),
    ("테스트", StatusColor::new(255, 206, 86, 50)),
    ("협의", StatusColor::new(153, 102, 255, 50)),
    ("운영점검", StatusColor::new(54, 162, 235, 50)),
    ("반려", StatusColor::new(255, 159, 64, 50)),
];

const FALLBACK: &[StatusColor] = &[
    StatusColor::new(31, 119, 180, 50),
    StatusColor::new(44, 160, 44, 50),
    StatusColor::new(214, 39, 40, 50),
    StatusColor::new(148, 103, 189, 50),
    StatusColor::new(140, 86, 75, 50),
    StatusColor::new(227, 119, 194, 50),
    StatusColor::new(127, 127, 127, 50),
    StatusColor::new(188, 189, 34, 50),
    StatusColor::new(23, 190, 207, 50),
    StatusColor::new(255, 127, 14, 50),
    StatusColor::new(102, 194, 165, 50),
    StatusColor::new(252, 141, 98, 50),
];

pub fn known_color(status: &str) -> Option<StatusColor> {
    KNOWN
        .iter()
        .find(|(label, _)| *label == status)
        .map(|(_, color)| *color)
}

pub fn fallback_index(status: &str) -> usize {
    let digest = Sha256::digest(status.as_bytes());
    let head = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    head as usize % FALLBACK.len()
}

pub fn status_color(status: &str) -> StatusColor {
    known_color(status).unwrap_or_else(|| FALLBACK[fallback_index(status)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_use_fixed_colours() {
        assert_eq!(status_color("종료").to_css(), "rgba(75, 192, 192, 0.5)");
        assert_eq!(status_color("반려").to_hex(), "#ff9f40");
    }

    #[test]
    fn fallback_is_stable_and_in_palette() {
        for label in ["Escalated", "On hold", "보류", ""] {
            let first = status_color(label);
            assert_eq!(first, status_color(label));
            assert!(FALLBACK.contains(&first));
        }
    }
}
