use crate::writer::format_real;

/// Device color used for drawn text and shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    /// Components from 0.0 to 1.0
    Rgb(f64, f64, f64),
    /// 0.0 is black, 1.0 is white
    Gray(f64),
    Cmyk(f64, f64, f64, f64),
}

impl Color {
    /// RGB color with components clamped to 0.0-1.0.
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Color::Rgb(r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0))
    }

    pub fn gray(value: f64) -> Self {
        Color::Gray(value.clamp(0.0, 1.0))
    }

    pub fn cmyk(c: f64, m: f64, y: f64, k: f64) -> Self {
        Color::Cmyk(
            c.clamp(0.0, 1.0),
            m.clamp(0.0, 1.0),
            y.clamp(0.0, 1.0),
            k.clamp(0.0, 1.0),
        )
    }

    pub fn black() -> Self {
        Color::Gray(0.0)
    }

    pub fn white() -> Self {
        Color::Gray(1.0)
    }

    pub fn red() -> Self {
        Color::Rgb(1.0, 0.0, 0.0)
    }

    pub fn blue() -> Self {
        Color::Rgb(0.0, 0.0, 1.0)
    }

    /// `#rrggbb` or `rrggbb`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .ok()
                .map(|v| f64::from(v) / 255.0)
        };
        Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    fn components(&self) -> Vec<f64> {
        match *self {
            Color::Rgb(r, g, b) => vec![r, g, b],
            Color::Gray(g) => vec![g],
            Color::Cmyk(c, m, y, k) => vec![c, m, y, k],
        }
    }

    fn with_operator(&self, gray: &str, rgb: &str, cmyk: &str) -> String {
        let operator = match self {
            Color::Gray(_) => gray,
            Color::Rgb(..) => rgb,
            Color::Cmyk(..) => cmyk,
        };
        let mut out: Vec<String> = self.components().into_iter().map(format_real).collect();
        out.push(operator.to_string());
        out.join(" ")
    }

    /// Operator setting this as the nonstroking color (`g`, `rg` or `k`)
    pub fn fill_operator(&self) -> String {
        self.with_operator("g", "rg", "k")
    }

    /// Operator setting this as the stroking color (`G`, `RG` or `K`)
    pub fn stroke_operator(&self) -> String {
        self.with_operator("G", "RG", "K")
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    /// Accepts a hex triple or one of a few names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "black" => Ok(Color::black()),
            "white" => Ok(Color::white()),
            "gray" | "grey" => Ok(Color::gray(0.5)),
            "red" => Ok(Color::red()),
            "blue" => Ok(Color::blue()),
            other => Color::from_hex(other).ok_or_else(|| format!("invalid color '{s}'")),
        }
    }
}
