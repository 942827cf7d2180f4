//! A finite element engine driven by symbolic weak formulations.
//!
//! A [`Model`](model::Model) holds a mesh with tagged regions, fields with per-region orders
//! and constraints, and scalar parameters. Weak formulations are sums of integral terms over
//! regions whose integrands are expressions of unknown and test placeholders, field values,
//! coordinates and parameters. Assembly linearizes the integrands into bilinear and linear
//! forms and produces sparse systems, which are solved directly, as eigenvalue problems or
//! repeatedly inside a ramped nonlinear iteration.

pub mod assembly;
pub mod dof;
pub mod eigen;
pub mod element;
pub mod error;
pub mod evaluation;
pub mod expression;
pub mod field;
pub mod formulation;
pub mod integrate;
pub mod interpolate;
pub mod io;
pub mod mesh;
pub mod model;
pub mod nonlinear;
pub mod region;
pub mod shape_function;
pub mod solve;

pub mod quadrature {
    pub use weakform_quadrature::*;
}

pub mod sparse {
    pub use weakform_sparse::*;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
pub extern crate vtkio;
