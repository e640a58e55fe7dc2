//! Conversion between layers and Loro values.
//!
//! Every layer is one nested `LoroMap` with scalar fields, so concurrent edits
//! to different fields of the same layer merge independently.

use crate::color::Color;
use crate::layers::{Layer, LayerPatch, LayerPayload, PenPoint};
use loro::{LoroList, LoroMap, LoroMapValue, LoroResult, LoroValue};

// Layer type identifiers
const TYPE_RECTANGLE: &str = "rectangle";
const TYPE_ELLIPSE: &str = "ellipse";
const TYPE_TEXT: &str = "text";
const TYPE_NOTE: &str = "note";
const TYPE_PATH: &str = "path";

const KEY_TYPE: &str = "type";
const KEY_X: &str = "x";
const KEY_Y: &str = "y";
const KEY_WIDTH: &str = "width";
const KEY_HEIGHT: &str = "height";
const KEY_FILL_R: &str = "fill_r";
const KEY_FILL_G: &str = "fill_g";
const KEY_FILL_B: &str = "fill_b";
const KEY_VALUE: &str = "value";
const KEY_POINTS: &str = "points";

fn get_double(map: &LoroMapValue, key: &str) -> Option<f64> {
    match map.get(key)? {
        LoroValue::Double(d) => Some(*d),
        LoroValue::I64(i) => Some(*i as f64),
        _ => None,
    }
}

fn get_channel(map: &LoroMapValue, key: &str) -> Option<u8> {
    let value = match map.get(key)? {
        LoroValue::I64(i) => *i,
        LoroValue::Double(d) => *d as i64,
        _ => return None,
    };
    Some(value.clamp(0, 255) as u8)
}

fn get_string(map: &LoroMapValue, key: &str) -> Option<String> {
    match map.get(key)? {
        LoroValue::String(s) => Some(s.to_string()),
        _ => None,
    }
}

fn as_f64(value: &LoroValue) -> Option<f64> {
    match value {
        LoroValue::Double(d) => Some(*d),
        LoroValue::I64(i) => Some(*i as f64),
        _ => None,
    }
}

fn fill_to_loro(fill: Color, map: &LoroMap) -> LoroResult<()> {
    map.insert(KEY_FILL_R, fill.r as i64)?;
    map.insert(KEY_FILL_G, fill.g as i64)?;
    map.insert(KEY_FILL_B, fill.b as i64)?;
    Ok(())
}

/// Write a full layer record into `map`.
pub fn layer_to_loro(layer: &Layer, map: &LoroMap) -> LoroResult<()> {
    map.insert(KEY_X, layer.x)?;
    map.insert(KEY_Y, layer.y)?;
    map.insert(KEY_WIDTH, layer.width)?;
    map.insert(KEY_HEIGHT, layer.height)?;
    fill_to_loro(layer.fill, map)?;

    match &layer.payload {
        LayerPayload::Rectangle => map.insert(KEY_TYPE, TYPE_RECTANGLE)?,
        LayerPayload::Ellipse => map.insert(KEY_TYPE, TYPE_ELLIPSE)?,
        LayerPayload::Text { value } => {
            map.insert(KEY_TYPE, TYPE_TEXT)?;
            if let Some(value) = value {
                map.insert(KEY_VALUE, value.as_str())?;
            }
        }
        LayerPayload::Note { value } => {
            map.insert(KEY_TYPE, TYPE_NOTE)?;
            if let Some(value) = value {
                map.insert(KEY_VALUE, value.as_str())?;
            }
        }
        LayerPayload::Path { points } => {
            map.insert(KEY_TYPE, TYPE_PATH)?;
            let points_list = map.insert_container(KEY_POINTS, LoroList::new())?;
            for point in points {
                let sample = points_list.insert_container(points_list.len(), LoroList::new())?;
                sample.push(point.x)?;
                sample.push(point.y)?;
                sample.push(point.pressure)?;
            }
        }
    }

    Ok(())
}

/// Write only the fields present in `patch`.
pub fn patch_to_loro(patch: &LayerPatch, map: &LoroMap) -> LoroResult<()> {
    if let Some(x) = patch.x {
        map.insert(KEY_X, x)?;
    }
    if let Some(y) = patch.y {
        map.insert(KEY_Y, y)?;
    }
    if let Some(width) = patch.width {
        map.insert(KEY_WIDTH, width)?;
    }
    if let Some(height) = patch.height {
        map.insert(KEY_HEIGHT, height)?;
    }
    if let Some(fill) = patch.fill {
        fill_to_loro(fill, map)?;
    }
    Ok(())
}

/// Read a layer record. Returns `None` for unknown types or missing fields.
pub fn layer_from_loro(map: &LoroMapValue) -> Option<Layer> {
    let payload = match get_string(map, KEY_TYPE)?.as_str() {
        TYPE_RECTANGLE => LayerPayload::Rectangle,
        TYPE_ELLIPSE => LayerPayload::Ellipse,
        TYPE_TEXT => LayerPayload::Text {
            value: get_string(map, KEY_VALUE),
        },
        TYPE_NOTE => LayerPayload::Note {
            value: get_string(map, KEY_VALUE),
        },
        TYPE_PATH => LayerPayload::Path {
            points: points_from_loro(map),
        },
        _ => return None,
    };

    Some(Layer {
        x: get_double(map, KEY_X)?,
        y: get_double(map, KEY_Y)?,
        width: get_double(map, KEY_WIDTH)?,
        height: get_double(map, KEY_HEIGHT)?,
        fill: Color::new(
            get_channel(map, KEY_FILL_R).unwrap_or(0),
            get_channel(map, KEY_FILL_G).unwrap_or(0),
            get_channel(map, KEY_FILL_B).unwrap_or(0),
        ),
        payload,
    })
}

fn points_from_loro(map: &LoroMapValue) -> Vec<PenPoint> {
    let Some(LoroValue::List(points_list)) = map.get(KEY_POINTS) else {
        return Vec::new();
    };

    points_list
        .iter()
        .filter_map(|sample| {
            let LoroValue::List(coords) = sample else {
                return None;
            };
            let x = as_f64(coords.first()?)?;
            let y = as_f64(coords.get(1)?)?;
            let pressure = coords.get(2).and_then(as_f64).unwrap_or(0.5);
            Some(PenPoint::new(x, y, pressure))
        })
        .collect()
}
