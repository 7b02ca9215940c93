use serde::{Deserialize, Serialize};

use crate::Identity;

/// A circle fitted around a detection.  Coordinates are in pixels.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Circle {
    pub x: f64,
    pub y: f64,

    pub r: f64,

    pub identity: Identity,
}

/// An ellipse fitted to a detection.  `w` and `h` are the full extents of the
/// fitted axes and `angle` is the fitter's rotation in degrees.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Ellipse {
    pub x: f64,
    pub y: f64,

    pub w: f64,
    pub h: f64,

    pub angle: f64,

    pub identity: Identity,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, derive_more::From)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Circle(Circle),
    Ellipse(Ellipse),
}

impl Shape {
    pub fn center(&self) -> [f64; 2] {
        match self {
            Shape::Circle(c) => [c.x, c.y],
            Shape::Ellipse(e) => [e.x, e.y],
        }
    }

    pub fn identity(&self) -> Identity {
        match self {
            Shape::Circle(c) => c.identity,
            Shape::Ellipse(e) => e.identity,
        }
    }

    pub fn set_identity(&mut self, identity: Identity) {
        match self {
            Shape::Circle(c) => c.identity = identity,
            Shape::Ellipse(e) => e.identity = identity,
        }
    }

    /// Copy of this shape carrying `identity`.
    pub fn relabeled(&self, identity: Identity) -> Shape {
        let mut shape = self.clone();
        shape.set_identity(identity);
        shape
    }

    pub fn as_circle(&self) -> Option<&Circle> {
        match self {
            Shape::Circle(c) => Some(c),
            Shape::Ellipse(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relabel_copies() {
        let original: Shape = Circle {
            x: 1.0,
            y: 2.0,
            r: 3.0,
            identity: Identity::numbered(7),
        }
        .into();
        let copy = original.relabeled(Identity::sensor(2, 'a'));

        assert_eq!(original.identity(), Identity::numbered(7));
        assert_eq!(copy.identity(), Identity::sensor(2, 'a'));
        assert_eq!(copy.center(), [1.0, 2.0]);
    }

    #[test]
    fn test_tagged_json() {
        let shape: Shape = Ellipse {
            x: 10.0,
            y: 20.0,
            w: 8.0,
            h: 4.0,
            angle: 30.0,
            identity: Identity::sensor(1, 'a'),
        }
        .into();
        let json = serde_json::to_string(&shape).unwrap();
        assert!(json.contains("\"kind\":\"ellipse\""));
        let back: Shape = serde_json::from_str(&json).unwrap();
        assert_eq!(back, shape);
    }
}
