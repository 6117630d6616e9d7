use crate::track::Touch;

/// Values per touch row of the output buffer: x, y, z, dz and age.
pub const OUTPUT_COLUMNS: usize = 5;

/// Writes one row per touch and zeroes the rest of `output`.
/// Ages are written as floats. `output` must hold at least
/// `touches.len() * OUTPUT_COLUMNS` values.
pub fn write_touches(touches: &[Touch], output: &mut [f32]) {
    let (rows, rest) = output.split_at_mut(touches.len() * OUTPUT_COLUMNS);
    for (row, touch) in rows.chunks_exact_mut(OUTPUT_COLUMNS).zip(touches) {
        row.copy_from_slice(&[touch.x, touch.y, touch.z, touch.dz, touch.age as f32]);
    }
    rest.fill(0.0);
}

/// Reads back the touch in row `index`.
pub fn read_touch(output: &[f32], index: usize) -> Touch {
    let row = &output[index * OUTPUT_COLUMNS..(index + 1) * OUTPUT_COLUMNS];
    Touch {
        x: row[0],
        y: row[1],
        z: row[2],
        dz: row[3],
        age: row[4] as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let touches = [
            Touch {
                x: 1.0,
                y: 2.0,
                z: 0.5,
                dz: 0.1,
                age: 7,
            },
            Touch::default(),
        ];
        let mut output = [9.0; 12];
        write_touches(&touches, &mut output);
        assert_eq!(&output[..5], &[1.0, 2.0, 0.5, 0.1, 7.0]);
        assert_eq!(&output[5..], &[0.0; 7]);
        assert_eq!(read_touch(&output, 0), touches[0]);
    }
}
