//! Argument parsing shared across CLI commands.

use skyfeed::geo::BoundingBox;

/// Parse `S,W,N,E` in degrees into a bounding box.
pub fn parse_bounds(s: &str) -> Result<BoundingBox, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect::<Result<_, _>>()?;

    let [south, west, north, east] = parts[..] else {
        return Err(format!(
            "expected four values S,W,N,E, got {}",
            parts.len()
        ));
    };
    if parts.iter().any(|v| !v.is_finite()) {
        return Err("bounds must be finite".to_string());
    }
    if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
        return Err("latitudes must be within -90..90".to_string());
    }
    if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) {
        return Err("longitudes must be within -180..180".to_string());
    }

    Ok(BoundingBox::normalized(south, west, north, east))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounds() {
        let bounds = parse_bounds("40, -10, 50, 10").unwrap();
        assert_eq!(bounds, BoundingBox::normalized(40.0, -10.0, 50.0, 10.0));
    }

    #[test]
    fn test_parse_bounds_rejects_bad_input() {
        assert!(parse_bounds("40,-10,50").is_err());
        assert!(parse_bounds("40,-10,50,east").is_err());
        assert!(parse_bounds("40,-10,95,10").is_err());
        assert!(parse_bounds("40,-190,50,10").is_err());
        assert!(parse_bounds("NaN,-10,50,10").is_err());
    }
}
