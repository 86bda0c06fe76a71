//! Colorspace conversions. Every channel is on a 0-100 scale except hue,
//! which is in degrees.

/// Hue of an RGB triple, or `fallback` when the color is achromatic.
pub fn rgb2hue(red: f64, green: f64, blue: f64, fallback: f64) -> f64 {
    let value = red.max(green).max(blue);
    let whiteness = red.min(green).min(blue);
    let chroma = value - whiteness;
    if chroma == 0.0 {
        return fallback;
    }

    let (segment, shift) = if value == red {
        let segment = (green - blue) / chroma;
        (segment, if segment < 0.0 { 6.0 } else { 0.0 })
    } else if value == green {
        ((blue - red) / chroma, 2.0)
    } else {
        ((red - green) / chroma, 4.0)
    };
    (segment + shift) * 60.0
}

pub fn rgb2hsl(red: f64, green: f64, blue: f64, fallback: f64) -> [f64; 3] {
    let hue = rgb2hue(red, green, blue, fallback);
    let value = red.max(green).max(blue);
    let whiteness = red.min(green).min(blue);
    let chroma = value - whiteness;
    let lightness = (value + whiteness) / 2.0;
    let saturation = if lightness == 0.0 || lightness == 100.0 {
        0.0
    } else {
        chroma / (100.0 - (2.0 * lightness - 100.0).abs()) * 100.0
    };
    [hue, saturation, lightness]
}

pub fn hsl2rgb(hue: f64, saturation: f64, lightness: f64) -> [f64; 3] {
    let t2 = if lightness <= 50.0 {
        lightness * (saturation + 100.0) / 100.0
    } else {
        lightness + saturation - lightness * saturation / 100.0
    };
    let t1 = lightness * 2.0 - t2;
    [
        hue2channel(t1, t2, hue + 120.0),
        hue2channel(t1, t2, hue),
        hue2channel(t1, t2, hue - 120.0),
    ]
}

fn hue2channel(t1: f64, t2: f64, hue: f64) -> f64 {
    let hue = if hue < 0.0 {
        hue + 360.0
    } else if hue > 360.0 {
        hue - 360.0
    } else {
        hue
    };

    if hue * 6.0 < 360.0 {
        t1 + (t2 - t1) * hue / 60.0
    } else if hue * 2.0 < 360.0 {
        t2
    } else if hue * 3.0 < 720.0 {
        t1 + (t2 - t1) * (240.0 - hue) / 60.0
    } else {
        t1
    }
}

pub fn rgb2hwb(red: f64, green: f64, blue: f64, fallback: f64) -> [f64; 3] {
    let hue = rgb2hue(red, green, blue, fallback);
    let whiteness = red.min(green).min(blue);
    let blackness = 100.0 - red.max(green).max(blue);
    [hue, whiteness, blackness]
}

pub fn hwb2rgb(hue: f64, whiteness: f64, blackness: f64) -> [f64; 3] {
    hsl2rgb(hue, 100.0, 50.0).map(|channel| channel * (100.0 - whiteness - blackness) / 100.0 + whiteness)
}

pub fn hsl2hwb(hue: f64, saturation: f64, lightness: f64) -> [f64; 3] {
    let [red, green, blue] = hsl2rgb(hue, saturation, lightness);
    let [_, whiteness, blackness] = rgb2hwb(red, green, blue, hue);
    [hue, whiteness, blackness]
}

pub fn hwb2hsl(hue: f64, whiteness: f64, blackness: f64) -> [f64; 3] {
    let [red, green, blue] = hwb2rgb(hue, whiteness, blackness);
    let [_, saturation, lightness] = rgb2hsl(red, green, blue, hue);
    [hue, saturation, lightness]
}

/// Relative luminance of an RGB triple.
pub fn rgb2luminance(red: f64, green: f64, blue: f64) -> f64 {
    0.2126 * channel2luminance(red) + 0.7152 * channel2luminance(green) + 0.0722 * channel2luminance(blue)
}

fn channel2luminance(channel: f64) -> f64 {
    let value = channel / 100.0;
    if value <= 0.03928 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

/// Hue units, normalized to degrees.
pub fn angle2deg(value: f64, unit: &str) -> f64 {
    match unit.to_ascii_lowercase().as_str() {
        "grad" => value * 0.9 % 360.0,
        "rad" => value * 180.0 / std::f64::consts::PI % 360.0,
        "turn" => value * 360.0 % 360.0,
        _ => value % 360.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: [f64; 3], expected: [f64; 3]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-8, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn rgb_hsl_round_trip() {
        for rgb in [[100.0, 0.0, 0.0], [20.0, 40.0, 60.0], [90.0, 85.0, 10.0], [50.0, 50.0, 50.0]] {
            let [h, s, l] = rgb2hsl(rgb[0], rgb[1], rgb[2], 0.0);
            assert_close(hsl2rgb(h, s, l), rgb);
        }
    }

    #[test]
    fn rgb_hwb_round_trip() {
        let [h, w, b] = rgb2hwb(20.0, 40.0, 60.0, 0.0);
        assert_close(hwb2rgb(h, w, b), [20.0, 40.0, 60.0]);
    }

    #[test]
    fn achromatic_colors_keep_the_fallback_hue() {
        assert_eq!(rgb2hue(50.0, 50.0, 50.0, 210.0), 210.0);
        assert_eq!(rgb2hue(0.0, 100.0, 0.0, 210.0), 120.0);
    }

    #[test]
    fn hue_units_become_degrees() {
        assert_eq!(angle2deg(90.0, "deg"), 90.0);
        assert_eq!(angle2deg(100.0, "grad"), 90.0);
        assert_eq!(angle2deg(0.25, "TURN"), 90.0);
        assert!((angle2deg(std::f64::consts::PI, "rad") - 180.0).abs() < 1e-9);
        assert_eq!(angle2deg(450.0, ""), 90.0);
    }

    #[test]
    fn luminance_spans_black_to_white() {
        assert_eq!(rgb2luminance(0.0, 0.0, 0.0), 0.0);
        assert!((rgb2luminance(100.0, 100.0, 100.0) - 1.0).abs() < 1e-9);
    }
}
