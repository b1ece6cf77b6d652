/// Propagate the highest set bit of `x` into every lower bit position.
///
/// `flood_right(0b0100_1000) == 0b0111_1111`. Used by the VRAM window code
/// to turn "first index XOR last index" into the span of address bits a
/// block read touches.
#[inline]
pub const fn flood_right(mut x: u32) -> u32 {
    x |= x >> 1;
    x |= x >> 2;
    x |= x >> 4;
    x |= x >> 8;
    x |= x >> 16;
    x
}
