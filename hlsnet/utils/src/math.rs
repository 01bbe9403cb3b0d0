/// Bit mask with the lowest `width` bits set.
pub fn mask(width: u32) -> u64 {
    if width >= 64 { u64::MAX } else { (1u64 << width) - 1 }
}

/// Number of levels of a balanced tree with `fan_in` leaves built from
/// cells with `cell_inputs` inputs each.
pub fn tree_levels(fan_in: usize, cell_inputs: usize) -> u32 {
    assert!(cell_inputs >= 2, "tree cells need at least two inputs");
    let mut levels = 0;
    let mut width = fan_in.max(1);
    while width > 1 {
        width = width.div_ceil(cell_inputs);
        levels += 1;
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_and_levels() {
        assert_eq!(mask(1), 1);
        assert_eq!(mask(8), 0xff);
        assert_eq!(mask(64), u64::MAX);
        assert_eq!(tree_levels(1, 6), 0);
        assert_eq!(tree_levels(2, 6), 1);
        assert_eq!(tree_levels(6, 6), 1);
        assert_eq!(tree_levels(7, 6), 2);
    }
}
