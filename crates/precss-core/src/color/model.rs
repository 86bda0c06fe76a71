use super::convert;

/// Channels of a color in the space it was produced in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Model {
    /// `hue` persists the last known hue so achromatic colors do not lose it.
    Rgb {
        red: f64,
        green: f64,
        blue: f64,
        hue: f64,
    },
    Hsl {
        hue: f64,
        saturation: f64,
        lightness: f64,
    },
    Hwb {
        hue: f64,
        whiteness: f64,
        blackness: f64,
    },
}

/// Interpolation space for `blend()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Space {
    #[default]
    Rgb,
    Hsl,
    Hwb,
}

impl Space {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rgb" => Some(Self::Rgb),
            "hsl" => Some(Self::Hsl),
            "hwb" => Some(Self::Hwb),
            _ => None,
        }
    }
}

/// A single channel that adjusters read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Alpha,
    Red,
    Green,
    Blue,
    Hue,
    Saturation,
    Lightness,
    Whiteness,
    Blackness,
}

/// An immutable color. Every derivation returns a new value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub model: Model,
    /// 0-100.
    pub alpha: f64,
}

impl Color {
    /// An RGB color whose hue is derived from its channels, keeping
    /// `fallback_hue` when they are achromatic.
    pub fn rgb(red: f64, green: f64, blue: f64, alpha: f64, fallback_hue: f64) -> Self {
        Self {
            model: Model::Rgb {
                red,
                green,
                blue,
                hue: convert::rgb2hue(red, green, blue, fallback_hue),
            },
            alpha,
        }
    }

    pub fn hsl(hue: f64, saturation: f64, lightness: f64, alpha: f64) -> Self {
        Self {
            model: Model::Hsl {
                hue,
                saturation,
                lightness,
            },
            alpha,
        }
    }

    pub fn hwb(hue: f64, whiteness: f64, blackness: f64, alpha: f64) -> Self {
        Self {
            model: Model::Hwb {
                hue,
                whiteness,
                blackness,
            },
            alpha,
        }
    }

    pub fn space(&self) -> Space {
        match self.model {
            Model::Rgb { .. } => Space::Rgb,
            Model::Hsl { .. } => Space::Hsl,
            Model::Hwb { .. } => Space::Hwb,
        }
    }

    fn own_hue(&self) -> f64 {
        match self.model {
            Model::Rgb { hue, .. } | Model::Hsl { hue, .. } | Model::Hwb { hue, .. } => hue,
        }
    }

    /// `[red, green, blue, hue]`.
    pub fn to_rgb(&self) -> [f64; 4] {
        let hue = self.own_hue();
        let [red, green, blue] = match self.model {
            Model::Rgb { red, green, blue, .. } => [red, green, blue],
            Model::Hsl {
                hue,
                saturation,
                lightness,
            } => convert::hsl2rgb(hue, saturation, lightness),
            Model::Hwb {
                hue,
                whiteness,
                blackness,
            } => convert::hwb2rgb(hue, whiteness, blackness),
        };
        [red, green, blue, hue]
    }

    /// `[hue, saturation, lightness]`.
    pub fn to_hsl(&self) -> [f64; 3] {
        match self.model {
            Model::Rgb {
                red,
                green,
                blue,
                hue,
            } => convert::rgb2hsl(red, green, blue, hue),
            Model::Hsl {
                hue,
                saturation,
                lightness,
            } => [hue, saturation, lightness],
            Model::Hwb {
                hue,
                whiteness,
                blackness,
            } => convert::hwb2hsl(hue, whiteness, blackness),
        }
    }

    /// `[hue, whiteness, blackness]`.
    pub fn to_hwb(&self) -> [f64; 3] {
        match self.model {
            Model::Rgb {
                red,
                green,
                blue,
                hue,
            } => convert::rgb2hwb(red, green, blue, hue),
            Model::Hsl {
                hue,
                saturation,
                lightness,
            } => convert::hsl2hwb(hue, saturation, lightness),
            Model::Hwb {
                hue,
                whiteness,
                blackness,
            } => [hue, whiteness, blackness],
        }
    }

    pub fn as_rgb(&self) -> Self {
        let [red, green, blue, hue] = self.to_rgb();
        Self::rgb(red, green, blue, self.alpha, hue)
    }

    pub fn as_hsl(&self) -> Self {
        let [hue, saturation, lightness] = self.to_hsl();
        Self::hsl(hue, saturation, lightness, self.alpha)
    }

    pub fn as_hwb(&self) -> Self {
        let [hue, whiteness, blackness] = self.to_hwb();
        Self::hwb(hue, whiteness, blackness, self.alpha)
    }

    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Alpha => self.alpha,
            Channel::Red => self.to_rgb()[0],
            Channel::Green => self.to_rgb()[1],
            Channel::Blue => self.to_rgb()[2],
            Channel::Hue => self.to_hsl()[0],
            Channel::Saturation => self.to_hsl()[1],
            Channel::Lightness => self.to_hsl()[2],
            Channel::Whiteness => self.to_hwb()[1],
            Channel::Blackness => self.to_hwb()[2],
        }
    }

    /// Set one channel, converting to the channel's space first. The value
    /// is clamped to its range.
    pub fn with(&self, channel: Channel, value: f64) -> Self {
        let value = normalize(channel, value);
        match channel {
            Channel::Alpha => Self {
                alpha: value,
                ..*self
            },
            Channel::Red | Channel::Green | Channel::Blue => {
                let [mut red, mut green, mut blue, hue] = self.to_rgb();
                match channel {
                    Channel::Red => red = value,
                    Channel::Green => green = value,
                    _ => blue = value,
                }
                Self::rgb(red, green, blue, self.alpha, hue)
            }
            Channel::Hue | Channel::Saturation | Channel::Lightness => {
                let [mut hue, mut saturation, mut lightness] = self.to_hsl();
                match channel {
                    Channel::Hue => hue = value,
                    Channel::Saturation => saturation = value,
                    _ => lightness = value,
                }
                Self::hsl(hue, saturation, lightness, self.alpha)
            }
            Channel::Whiteness | Channel::Blackness => {
                let [hue, mut whiteness, mut blackness] = self.to_hwb();
                if channel == Channel::Whiteness {
                    whiteness = value;
                } else {
                    blackness = value;
                }
                Self::hwb(hue, whiteness, blackness, self.alpha)
            }
        }
    }

    /// Set all three RGB channels at once.
    pub fn with_rgb(&self, red: f64, green: f64, blue: f64) -> Self {
        let hue = self.to_rgb()[3];
        Self::rgb(
            normalize(Channel::Red, red),
            normalize(Channel::Green, green),
            normalize(Channel::Blue, blue),
            self.alpha,
            hue,
        )
    }

    /// Interpolate towards `other` by `percentage` in `space`. Alpha is kept
    /// from `self` unless `with_alpha` is set.
    pub fn blend(&self, other: &Self, percentage: f64, space: Space, with_alpha: bool) -> Self {
        let addition = percentage / 100.0;
        let subtraction = 1.0 - addition;
        let mix = |a: f64, b: f64| a * subtraction + b * addition;
        let alpha = if with_alpha {
            mix(self.alpha, other.alpha)
        } else {
            self.alpha
        };

        match space {
            Space::Hsl => {
                let [h1, s1, l1] = self.to_hsl();
                let [h2, s2, l2] = other.to_hsl();
                Self::hsl(mix(h1, h2), mix(s1, s2), mix(l1, l2), alpha)
            }
            Space::Hwb => {
                let [h1, w1, b1] = self.to_hwb();
                let [h2, w2, b2] = other.to_hwb();
                Self::hwb(mix(h1, h2), mix(w1, w2), mix(b1, b2), alpha)
            }
            Space::Rgb => {
                let [r1, g1, b1, _] = self.to_rgb();
                let [r2, g2, b2, _] = other.to_rgb();
                Self::rgb(mix(r1, r2), mix(g1, g2), mix(b1, b2), alpha, 0.0)
            }
        }
    }

    /// Blend towards black in RGB.
    pub fn shade(&self, percentage: f64) -> Self {
        let black = Self::hwb(0.0, 0.0, 100.0, 100.0);
        self.as_hwb().blend(&black, percentage, Space::Rgb, false)
    }

    /// Blend towards white in RGB.
    pub fn tint(&self, percentage: f64) -> Self {
        let white = Self::hwb(0.0, 100.0, 0.0, 100.0);
        self.as_hwb().blend(&white, percentage, Space::Rgb, false)
    }

    pub fn luminance(&self) -> f64 {
        let [red, green, blue, _] = self.to_rgb();
        convert::rgb2luminance(red, green, blue)
    }

    pub fn contrast_ratio(&self, other: &Self) -> f64 {
        let l1 = self.luminance();
        let l2 = other.luminance();
        if l1 > l2 {
            (l1 + 0.05) / (l2 + 0.05)
        } else {
            (l2 + 0.05) / (l1 + 0.05)
        }
    }

    /// The `contrast()` adjuster: move from the color towards its maximum
    /// contrast color (white or black at the same hue) by `percentage`.
    pub fn contrast(&self, percentage: f64) -> Self {
        let hwb = self.as_hwb();
        let hue = hwb.own_hue();
        let max = if self.luminance() < 0.5 {
            Self::hwb(hue, 100.0, 0.0, self.alpha)
        } else {
            Self::hwb(hue, 0.0, 100.0, self.alpha)
        };

        let min = if self.contrast_ratio(&max) > 4.5 {
            min_contrast_color(&hwb, &max)
        } else {
            max
        };
        min.blend(&max, percentage, Space::Hwb, false)
    }
}

/// The color closest to `base` whose contrast with it still exceeds 4.5,
/// searched on the whiteness/blackness grid between `base` and `max`.
fn min_contrast_color(base: &Color, max: &Color) -> Color {
    let [hue, mut min_w, mut min_b] = base.to_hwb();
    let [_, mut max_w, mut max_b] = max.to_hwb();
    let mut candidate = *base;

    // Deliberate: both grids span 0-100, so the loop never runs and the
    // base color is the result. Published color-mod() output depends on it.
    while (min_w - max_w).abs() > 100.0 || (min_b - max_b).abs() > 100.0 {
        let mid_w = js_round((max_w + min_w) / 2.0);
        let mid_b = js_round((max_b + min_b) / 2.0);
        candidate = Color::hwb(hue, mid_w, mid_b, base.alpha);

        if candidate.contrast_ratio(base) > 4.5 {
            max_w = mid_w;
            max_b = mid_b;
        } else {
            min_w = mid_w;
            min_b = mid_b;
        }
    }
    candidate
}

fn normalize(channel: Channel, value: f64) -> f64 {
    if channel == Channel::Hue {
        (value % 360.0).clamp(0.0, 360.0)
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Round half towards positive infinity.
pub fn js_round(value: f64) -> f64 {
    (value + 0.5).floor()
}
