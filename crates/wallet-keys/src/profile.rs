//! Deterministic avatar defaults derived from an address

use crate::address::{keccak256, Address};

/// Current profile palette, indexed by `Account::color`
pub const PROFILE_COLORS: [&str; 26] = [
    "#FC5C54", "#FFD95A", "#E95D72", "#6A87C8", "#5FD0F3", "#75C06B", "#FFDD86", "#5FC6D4",
    "#FF949A", "#FF8024", "#9BA1A4", "#EC66FF", "#FF8CBC", "#FF9A23", "#C5DADB", "#A8CE63",
    "#71ABFF", "#FFE279", "#B6B1B6", "#FF6780", "#A575FF", "#4D82FF", "#FFB35A", "#1EC6AF",
    "#2FBBFC", "#F2A1FF",
];

/// Palette used before profile colours existed
pub const LEGACY_COLORS: [&str; 9] = [
    "#FF494A", "#01D3FF", "#FB60C4", "#3F6AFF", "#FFD963", "#B140FF", "#41EBC1", "#F46E38",
    "#6D7E8F",
];

/// Closest `PROFILE_COLORS` entry for each `LEGACY_COLORS` index
pub const LEGACY_COLOR_REMAP: [u32; 9] = [0, 4, 12, 21, 1, 20, 4, 9, 10];

pub const PROFILE_EMOJIS: [&str; 40] = [
    "🌶", "🤑", "🐙", "🍄", "🦍", "🐸", "🦊", "🐻", "🐼", "🐨", "🐯", "🦁", "🐮", "🐷",
    "🐵", "🐔", "🐧", "🐦", "🐤", "🦆", "🦅", "🦉", "🦇", "🐺", "🐗", "🐴", "🦄", "🐝",
    "🐛", "🦋", "🐌", "🐞", "🐢", "🐍", "🦖", "🦕", "🐡", "🐠", "🐟", "🐬",
];

fn address_hash(address: &Address) -> u32 {
    let hash = keccak256(address.to_lowercase_hex().as_bytes());
    u32::from_be_bytes([hash[28], hash[29], hash[30], hash[31]])
}

pub fn address_hashed_color_index(address: &Address) -> u32 {
    address_hash(address) % PROFILE_COLORS.len() as u32
}

pub fn address_hashed_emoji(address: &Address) -> &'static str {
    PROFILE_EMOJIS[(address_hash(address) % PROFILE_EMOJIS.len() as u32) as usize]
}

/// Out-of-table indices have no mapping
pub fn remap_legacy_color(index: u32) -> Option<u32> {
    LEGACY_COLOR_REMAP.get(index as usize).copied()
}

pub fn legacy_color_index(hex: &str) -> Option<u32> {
    LEGACY_COLORS
        .iter()
        .position(|c| c.eq_ignore_ascii_case(hex))
        .map(|i| i as u32)
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x1F000..=0x1F2FF | 0x2B00..=0x2BFF)
}

/// First emoji character in `text`, if any
pub fn first_emoji(text: &str) -> Option<char> {
    text.chars().find(|c| is_emoji(*c))
}

/// `"{emoji} {label}"` unless the label already carries an emoji
pub fn label_with_emoji(address: &Address, label: &str) -> String {
    if first_emoji(label).is_some() {
        label.to_string()
    } else if label.is_empty() {
        address_hashed_emoji(address).to_string()
    } else {
        format!("{} {}", address_hashed_emoji(address), label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_defaults_are_stable_and_in_range() {
        let address: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        let lower: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        assert_eq!(address_hashed_color_index(&address), address_hashed_color_index(&lower));
        assert!(address_hashed_color_index(&address) < PROFILE_COLORS.len() as u32);
        assert_eq!(address_hashed_emoji(&address), address_hashed_emoji(&lower));
    }

    #[test]
    fn test_every_emoji_is_detected() {
        for emoji in PROFILE_EMOJIS {
            assert!(first_emoji(emoji).is_some(), "{} not detected", emoji);
        }
        assert_eq!(first_emoji("My Wallet"), None);
        assert_eq!(first_emoji("Savings 🐙"), Some('🐙'));
    }

    #[test]
    fn test_legacy_remap_is_bounds_checked() {
        assert_eq!(remap_legacy_color(0), Some(0));
        assert_eq!(remap_legacy_color(8), Some(10));
        assert_eq!(remap_legacy_color(9), None);
        assert_eq!(remap_legacy_color(u32::MAX), None);
        assert_eq!(legacy_color_index("#01d3ff"), Some(1));
        for target in LEGACY_COLOR_REMAP {
            assert!((target as usize) < PROFILE_COLORS.len());
        }
    }

    #[test]
    fn test_label_with_emoji() {
        let address = Address::from_bytes([7; 20]);
        let prefixed = label_with_emoji(&address, "Trading");
        assert!(prefixed.ends_with(" Trading"));
        assert_eq!(label_with_emoji(&address, &prefixed), prefixed);
        assert_eq!(label_with_emoji(&address, ""), address_hashed_emoji(&address));
    }
}
