use crate::codec::Fields;
use crate::error::ParseError;
use crate::render::{RenderQueue, RenderRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLight {
    pub name: String,
    pub position: (f64, f64, f64),
    pub diffuse: (f64, f64, f64),
    pub attenuation_range: f64,
}

impl MapLight {
    pub fn create_mesh(&self, render: &RenderQueue) {
        render.queue(RenderRequest::CreateMapLight {
            light: self.name.clone(),
        });
    }

    pub fn destroy_mesh(&self, render: &RenderQueue) {
        render.queue(RenderRequest::DestroyMapLight {
            light: self.name.clone(),
        });
    }
}

impl fmt::Display for MapLight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y, z) = self.position;
        let (r, g, b) = self.diffuse;
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.name, x, y, z, r, g, b, self.attenuation_range
        )
    }
}

impl FromStr for MapLight {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::new(s);
        Ok(MapLight {
            name: fields.text("name")?.to_string(),
            position: (fields.parse("x")?, fields.parse("y")?, fields.parse("z")?),
            diffuse: (fields.parse("red")?, fields.parse("green")?, fields.parse("blue")?),
            attenuation_range: fields.parse("attenuation range")?,
        })
    }
}
