/// Maps a possibly out-of-bounds index into `0..len` by mirroring around the
/// edge pixels without repeating them (`dcb|abcd|cba`).
pub(crate) fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i > last {
            i = 2 * last - i;
        } else {
            return i as usize;
        }
    }
}
