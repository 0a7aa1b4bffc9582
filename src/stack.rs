//! Ordered description of a planar layered medium.
//!
//! A [`Stack`] is a validated sequence of [`LayerSpec`] values, incidence side
//! first. The first and last layers are semi-infinite; every layer in between
//! has a finite thickness. The global coordinate `z` is zero at the first
//! interface and increases into the stack.

use nalgebra::Rotation3;

use crate::config::LOSSLESS_THRESHOLD;
use crate::error::StackError;
use crate::material::Material;


/// One homogeneous layer of a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub epsilon: Material,
    pub mu: Material,
    /// `None` for the semi-infinite outer layers.
    pub thickness: Option<f64>,
}

impl LayerSpec {
    pub fn semi_infinite(
        name: impl Into<String>,
        epsilon: impl Into<Material>,
        mu: impl Into<Material>,
    ) -> Self {
        Self {
            name: name.into(),
            epsilon: epsilon.into(),
            mu: mu.into(),
            thickness: None,
        }
    }

    pub fn slab(
        name: impl Into<String>,
        epsilon: impl Into<Material>,
        mu: impl Into<Material>,
        thickness: f64,
    ) -> Self {
        Self {
            name: name.into(),
            epsilon: epsilon.into(),
            mu: mu.into(),
            thickness: Some(thickness),
        }
    }

    pub fn is_isotropic(&self) -> bool {
        self.epsilon.is_isotropic() && self.mu.is_isotropic()
    }
}

/// A validated, ordered sequence of layers, incidence side first.
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    layers: Vec<LayerSpec>,
}

impl Stack {
    /// Validates the layer sequence.
    ///
    /// Rejects stacks with fewer than two layers, thicknesses on the outer
    /// layers, missing, negative or non-finite interior thicknesses,
    /// non-finite material entries, vanishing `zz` components, and a
    /// superstrate that is anisotropic, absorbing or of non-positive index.
    pub fn new(layers: Vec<LayerSpec>) -> Result<Self, StackError> {
        if layers.len() < 2 {
            return Err(StackError::validation(format!(
                "a stack needs at least two layers, got {}",
                layers.len()
            )));
        }

        let last = layers.len() - 1;
        for (index, layer) in layers.iter().enumerate() {
            let outer = index == 0 || index == last;
            match (outer, layer.thickness) {
                (true, Some(_)) => {
                    return Err(StackError::validation(format!(
                        "semi-infinite layer '{}' cannot have a thickness",
                        layer.name
                    )))
                }
                (false, None) => {
                    return Err(StackError::validation(format!(
                        "interior layer '{}' has no thickness",
                        layer.name
                    )))
                }
                (false, Some(d)) if !d.is_finite() || d < 0.0 => {
                    return Err(StackError::validation(format!(
                        "layer '{}' has invalid thickness {}",
                        layer.name, d
                    )))
                }
                _ => {}
            }

            for (label, material) in [("epsilon", &layer.epsilon), ("mu", &layer.mu)] {
                if !material.is_finite() {
                    return Err(StackError::validation(format!(
                        "{} of layer '{}' is not finite",
                        label, layer.name
                    )));
                }
                if material.matrix()[(2, 2)].norm() == 0.0 {
                    return Err(StackError::validation(format!(
                        "{} of layer '{}' has a vanishing zz component",
                        label, layer.name
                    )));
                }
            }
        }

        validate_superstrate(&layers[0])?;

        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn superstrate(&self) -> &LayerSpec {
        &self.layers[0]
    }

    pub fn substrate(&self) -> &LayerSpec {
        &self.layers[self.layers.len() - 1]
    }

    /// Real refractive index `sqrt(ε μ)` of the superstrate.
    pub fn superstrate_index(&self) -> f64 {
        let layer = self.superstrate();
        let eps = layer.epsilon.scalar().map_or(1.0, |v| v.re);
        let mu = layer.mu.scalar().map_or(1.0, |v| v.re);
        (eps * mu).sqrt()
    }

    /// Thickness of layer `index`, zero for the semi-infinite outer layers.
    pub fn thickness(&self, index: usize) -> f64 {
        self.layers[index].thickness.unwrap_or(0.0)
    }

    /// The `z` of each layer's reference plane: the top interface for interior
    /// layers and the substrate, the first interface for the superstrate.
    pub fn interfaces(&self) -> Vec<f64> {
        let mut z = 0.0;
        let mut planes = Vec::with_capacity(self.layers.len());
        planes.push(0.0);
        for index in 1..self.layers.len() {
            planes.push(z);
            z += self.thickness(index);
        }
        planes
    }

    pub fn total_thickness(&self) -> f64 {
        (1..self.layers.len()).map(|i| self.thickness(i)).sum()
    }

    /// Index of the layer containing `z` and the coordinate relative to that
    /// layer's reference plane. Points on an interface belong to the layer
    /// below it.
    pub fn locate(&self, z: f64) -> (usize, f64) {
        if z < 0.0 {
            return (0, z);
        }
        let last = self.layers.len() - 1;
        let mut top = 0.0;
        for index in 1..last {
            let bottom = top + self.thickness(index);
            if z < bottom {
                return (index, z - top);
            }
            top = bottom;
        }
        (last, z - top)
    }

    /// The same stack with every material rotated by `rotation`.
    pub fn rotated(&self, rotation: &Rotation3<f64>) -> Self {
        let layers = self
            .layers
            .iter()
            .map(|layer| LayerSpec {
                epsilon: layer.epsilon.rotated(rotation),
                mu: layer.mu.rotated(rotation),
                ..layer.clone()
            })
            .collect();
        Self { layers }
    }
}

fn validate_superstrate(layer: &LayerSpec) -> Result<(), StackError> {
    let (Some(eps), Some(mu)) = (layer.epsilon.scalar(), layer.mu.scalar()) else {
        return Err(StackError::validation(format!(
            "superstrate '{}' must be isotropic",
            layer.name
        )));
    };
    if eps.im.abs() > LOSSLESS_THRESHOLD * eps.norm() || mu.im.abs() > LOSSLESS_THRESHOLD * mu.norm()
    {
        return Err(StackError::validation(format!(
            "superstrate '{}' must be non-absorbing, got epsilon = {}, mu = {}",
            layer.name, eps, mu
        )));
    }
    if eps.re <= 0.0 || mu.re <= 0.0 {
        return Err(StackError::validation(format!(
            "superstrate '{}' must have positive epsilon and mu, got {} and {}",
            layer.name, eps.re, mu.re
        )));
    }
    Ok(())
}
