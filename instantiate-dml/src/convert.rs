//! Literal-to-typed-property conversion.
//!
//! The fixed conversion table applied when a non-expression value lands on a
//! typed slot: numeric widening (int → real) and integral-only narrowing
//! (real → int), string parsing into url/color/geometry types, enum
//! validation against the resolved numeric encoding, list-of-T coercion by
//! wrapping a single convertible literal, and `null` clearing object-valued
//! slots. Anything not listed here is an invalid assignment; the caller
//! turns the returned message into a property error.

use crate::value::Color;
use crate::value::Point;
use crate::value::PropertyType;
use crate::value::Rect;
use crate::value::Size;
use crate::value::Value;
use ahash::AHashMap;
use once_cell::sync::Lazy;

static NAMED_COLORS: Lazy<AHashMap<&'static str, Color>> = Lazy::new(|| {
  let mut map = AHashMap::new();
  map.insert("black", Color::rgb(0x00, 0x00, 0x00));
  map.insert("white", Color::rgb(0xff, 0xff, 0xff));
  map.insert("red", Color::rgb(0xff, 0x00, 0x00));
  map.insert("green", Color::rgb(0x00, 0x80, 0x00));
  map.insert("blue", Color::rgb(0x00, 0x00, 0xff));
  map.insert("yellow", Color::rgb(0xff, 0xff, 0x00));
  map.insert("cyan", Color::rgb(0x00, 0xff, 0xff));
  map.insert("magenta", Color::rgb(0xff, 0x00, 0xff));
  map.insert("gray", Color::rgb(0x80, 0x80, 0x80));
  map.insert("darkgray", Color::rgb(0xa9, 0xa9, 0xa9));
  map.insert("lightgray", Color::rgb(0xd3, 0xd3, 0xd3));
  map.insert("orange", Color::rgb(0xff, 0xa5, 0x00));
  map.insert("purple", Color::rgb(0x80, 0x00, 0x80));
  map.insert("brown", Color::rgb(0xa5, 0x2a, 0x2a));
  map.insert("pink", Color::rgb(0xff, 0xc0, 0xcb));
  map.insert("transparent", Color::argb(0x00, 0x00, 0x00, 0x00));
  map
});

/// Convert `value` for assignment to a slot of type `ty`.
pub fn convert(value: &Value, ty: &PropertyType) -> Result<Value, String> {
  let mismatch = || {
    Err(format!(
      "cannot assign {} to property of type {}",
      value.kind_name(),
      ty.name()
    ))
  };

  match ty {
    PropertyType::Var => Ok(value.clone()),

    PropertyType::Bool => match value {
      Value::Bool(_) => Ok(value.clone()),
      _ => mismatch(),
    },

    PropertyType::Int => match value {
      Value::Int(_) => Ok(value.clone()),
      Value::Real(r) if r.fract() == 0.0 && *r >= i32::MIN as f64 && *r <= i32::MAX as f64 => {
        Ok(Value::Int(*r as i32))
      }
      Value::Real(_) => Err("cannot assign a non-integral number to an int property".into()),
      _ => mismatch(),
    },

    PropertyType::Real => match value {
      Value::Real(_) => Ok(value.clone()),
      Value::Int(i) => Ok(Value::Real(*i as f64)),
      _ => mismatch(),
    },

    PropertyType::String => match value {
      Value::String(_) => Ok(value.clone()),
      Value::Bool(b) => Ok(Value::String(if *b { "true" } else { "false" }.into())),
      Value::Int(i) => Ok(Value::String(i.to_string())),
      Value::Real(r) => Ok(Value::String(format_real(*r))),
      _ => mismatch(),
    },

    PropertyType::Url => match value {
      Value::Url(_) => Ok(value.clone()),
      Value::String(s) => Ok(Value::Url(s.clone())),
      _ => mismatch(),
    },

    PropertyType::Color => match value {
      Value::Color(_) => Ok(value.clone()),
      Value::String(s) => parse_color(s)
        .map(Value::Color)
        .ok_or_else(|| format!("\"{s}\" is not a valid color")),
      _ => mismatch(),
    },

    PropertyType::Point => match value {
      Value::Point(_) => Ok(value.clone()),
      Value::String(s) => parse_point(s)
        .map(Value::Point)
        .ok_or_else(|| format!("\"{s}\" is not a valid point (expected \"x,y\")")),
      _ => mismatch(),
    },

    PropertyType::Size => match value {
      Value::Size(_) => Ok(value.clone()),
      Value::String(s) => parse_size(s)
        .map(Value::Size)
        .ok_or_else(|| format!("\"{s}\" is not a valid size (expected \"widthxheight\")")),
      _ => mismatch(),
    },

    PropertyType::Rect => match value {
      Value::Rect(_) => Ok(value.clone()),
      Value::String(s) => parse_rect(s)
        .map(Value::Rect)
        .ok_or_else(|| format!("\"{s}\" is not a valid rect (expected \"x,y,widthxheight\")")),
      _ => mismatch(),
    },

    PropertyType::Enum(encoding) => match value {
      Value::Int(raw) if encoding.contains(*raw) => Ok(Value::Int(*raw)),
      Value::Int(raw) => Err(format!(
        "{raw} is not a value of enum {}",
        encoding.name
      )),
      Value::String(name) => encoding
        .value_of(name)
        .map(Value::Int)
        .ok_or_else(|| format!("\"{name}\" is not a value of enum {}", encoding.name)),
      _ => mismatch(),
    },

    PropertyType::Object(_) => match value {
      // `null` clears object-valued properties.
      Value::Null => Ok(Value::Null),
      Value::Object(_) => Ok(value.clone()),
      _ => mismatch(),
    },

    PropertyType::List(element) => match value {
      Value::List(items) => {
        let mut converted = Vec::with_capacity(items.len());
        for item in items {
          converted.push(convert(item, element)?);
        }
        Ok(Value::List(converted))
      }
      // A single convertible literal coerces to a one-element list.
      other => Ok(Value::List(vec![convert(other, element)?])),
    },
  }
}

fn format_real(value: f64) -> String {
  let mut formatted = format!("{value}");
  if let Some(stripped) = formatted.strip_suffix(".0") {
    formatted = stripped.to_string();
  }
  formatted
}

pub(crate) fn parse_color(text: &str) -> Option<Color> {
  if let Some(hex) = text.strip_prefix('#') {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
      return None;
    }
    return match hex.len() {
      3 => {
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
        let (r, g, b) = (nibble(0)?, nibble(1)?, nibble(2)?);
        Some(Color::rgb(r << 4 | r, g << 4 | g, b << 4 | b))
      }
      6 => {
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?))
      }
      8 => {
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Color::argb(byte(0)?, byte(2)?, byte(4)?, byte(6)?))
      }
      _ => None,
    };
  }
  NAMED_COLORS.get(text.to_ascii_lowercase().as_str()).copied()
}

fn parse_point(text: &str) -> Option<Point> {
  let (x, y) = text.split_once(',')?;
  Some(Point {
    x: x.trim().parse().ok()?,
    y: y.trim().parse().ok()?,
  })
}

fn parse_size(text: &str) -> Option<Size> {
  let (width, height) = text.split_once('x')?;
  Some(Size {
    width: width.trim().parse().ok()?,
    height: height.trim().parse().ok()?,
  })
}

fn parse_rect(text: &str) -> Option<Rect> {
  let (x, rest) = text.split_once(',')?;
  let (y, size) = rest.split_once(',')?;
  let size = parse_size(size)?;
  Some(Rect {
    x: x.trim().parse().ok()?,
    y: y.trim().parse().ok()?,
    width: size.width,
    height: size.height,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::value::EnumEncoding;
  use std::sync::Arc;

  #[test]
  fn numeric_widening_and_narrowing() {
    assert_eq!(convert(&Value::Int(3), &PropertyType::Real), Ok(Value::Real(3.0)));
    assert_eq!(convert(&Value::Real(4.0), &PropertyType::Int), Ok(Value::Int(4)));
    assert!(convert(&Value::Real(4.5), &PropertyType::Int).is_err());
    assert!(convert(&Value::Bool(true), &PropertyType::Int).is_err());
  }

  #[test]
  fn strings_parse_into_structured_types() {
    assert_eq!(
      convert(&Value::String("#ff8800".into()), &PropertyType::Color),
      Ok(Value::Color(Color::rgb(0xff, 0x88, 0x00)))
    );
    assert_eq!(
      convert(&Value::String("#8000ff00".into()), &PropertyType::Color),
      Ok(Value::Color(Color::argb(0x80, 0x00, 0xff, 0x00)))
    );
    assert_eq!(
      convert(&Value::String("red".into()), &PropertyType::Color),
      Ok(Value::Color(Color::rgb(0xff, 0x00, 0x00)))
    );
    assert_eq!(
      convert(&Value::String("3,4".into()), &PropertyType::Point),
      Ok(Value::Point(Point { x: 3.0, y: 4.0 }))
    );
    assert_eq!(
      convert(&Value::String("100x50".into()), &PropertyType::Size),
      Ok(Value::Size(Size {
        width: 100.0,
        height: 50.0
      }))
    );
    assert_eq!(
      convert(&Value::String("1,2,30x40".into()), &PropertyType::Rect),
      Ok(Value::Rect(Rect {
        x: 1.0,
        y: 2.0,
        width: 30.0,
        height: 40.0
      }))
    );
    assert!(convert(&Value::String("#zzz".into()), &PropertyType::Color).is_err());
  }

  #[test]
  fn enum_values_validate_against_encoding() {
    let ty = PropertyType::Enum(Arc::new(EnumEncoding {
      name: "Align".into(),
      values: vec![("Left".into(), 0), ("Right".into(), 2)],
    }));
    assert_eq!(convert(&Value::String("Right".into()), &ty), Ok(Value::Int(2)));
    assert_eq!(convert(&Value::Int(0), &ty), Ok(Value::Int(0)));
    assert!(convert(&Value::Int(1), &ty).is_err());
    assert!(convert(&Value::String("Center".into()), &ty).is_err());
  }

  #[test]
  fn single_literal_wraps_into_list() {
    let ty = PropertyType::List(Box::new(PropertyType::Int));
    assert_eq!(
      convert(&Value::Int(5), &ty),
      Ok(Value::List(vec![Value::Int(5)]))
    );
    assert_eq!(
      convert(&Value::List(vec![Value::Int(1), Value::Real(2.0)]), &ty),
      Ok(Value::List(vec![Value::Int(1), Value::Int(2)]))
    );
    assert!(convert(&Value::Bool(true), &ty).is_err());
  }

  #[test]
  fn null_clears_object_properties() {
    assert_eq!(
      convert(&Value::Null, &PropertyType::Object(None)),
      Ok(Value::Null)
    );
    assert!(convert(&Value::Null, &PropertyType::Int).is_err());
  }

  #[test]
  fn reals_format_into_strings_without_trailing_zero() {
    assert_eq!(
      convert(&Value::Real(1.0), &PropertyType::String),
      Ok(Value::String("1".into()))
    );
    assert_eq!(
      convert(&Value::Real(1.5), &PropertyType::String),
      Ok(Value::String("1.5".into()))
    );
  }
}
