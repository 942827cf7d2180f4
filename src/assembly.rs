//! Assembly of weak formulations into sparse linear systems.
//!
//! Every term is linearized into monomials `c(x) * unknown * test`. Local element matrices and
//! vectors are computed per integration domain, optionally in parallel with one workspace per
//! worker thread, and then scattered sequentially in a fixed order into a COO matrix that is
//! converted to CSR. Constrained DOFs are eliminated during the scatter: their rows are
//! dropped and their columns are moved to the right-hand side.

use crate::dof::{DofKey, DofNumbering, FieldDiscretization, GlobalDof};
use crate::evaluation::{integration_domains, quadrature_points, Domain, FaceField, PointEnvironment, QuadraturePoint};
use crate::expression::{evaluate, linearize, Monomial};
use crate::field::FieldId;
use crate::formulation::{Formulation, Term, TermKind};
use crate::model::Model;
use eyre::eyre;
use itertools::Itertools;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use thread_local::ThreadLocal;

/// Quadrature degrees are clamped to this value.
const MAX_QUADRATURE_DEGREE: usize = 30;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblySettings {
    /// Compute local contributions in parallel with rayon.
    pub parallel: bool,
}

impl Default for AssemblySettings {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// An assembled system `matrix * x = rhs` in the unknowns of `numbering`.
#[derive(Debug, Clone)]
pub struct LinearSystem {
    pub matrix: CsrMatrix<f64>,
    pub rhs: DVector<f64>,
    pub numbering: DofNumbering,
}

/// Stiffness and mass matrices of a generalized eigenvalue problem.
#[derive(Debug, Clone)]
pub struct GeneralizedSystem {
    pub stiffness: CsrMatrix<f64>,
    pub mass: CsrMatrix<f64>,
    pub numbering: DofNumbering,
}

#[derive(Debug)]
struct PreparedTerm {
    kind: TermKind,
    monomials: Vec<Monomial>,
    domains: Vec<Domain>,
    /// Fields with unknown or test placeholders, followed by fields only used for their values.
    fields: Vec<FieldId>,
    num_placeholder_fields: usize,
    degree: usize,
}

#[derive(Debug)]
struct LocalContribution {
    kind: TermKind,
    dofs: Vec<GlobalDof>,
    matrix: DMatrix<f64>,
    vector: DVector<f64>,
}

#[derive(Debug, Default)]
struct AssemblyWorkspace {
    points: Vec<QuadraturePoint>,
    fields: Vec<FaceField>,
}

/// Assembles formulations of a model.
#[derive(Debug, Default)]
pub struct Assembler {
    settings: AssemblySettings,
    workspace: ThreadLocal<RefCell<AssemblyWorkspace>>,
}

impl Assembler {
    pub fn new(settings: AssemblySettings) -> Self {
        Self {
            settings,
            workspace: ThreadLocal::new(),
        }
    }

    pub fn settings(&self) -> &AssemblySettings {
        &self.settings
    }

    /// Assembles the stiffness terms of a formulation.
    ///
    /// # Panics
    ///
    /// Panics if an integrand cannot be linearized, or if a term references an unknown region.
    pub fn assemble(&self, model: &Model, formulation: &Formulation) -> eyre::Result<LinearSystem> {
        let (numbering, contributions) = self.local_contributions(model, formulation, &[TermKind::Stiffness])?;
        let (matrix, rhs) = scatter(&numbering, &contributions, TermKind::Stiffness);
        debug!(
            "Assembled system with {} unknowns, {} fixed DOFs and {} non-zeros",
            numbering.num_unknowns(),
            numbering.num_fixed(),
            matrix.nnz()
        );
        Ok(LinearSystem {
            matrix,
            rhs,
            numbering,
        })
    }

    /// Assembles the stiffness and the mass terms of a formulation in a common numbering.
    ///
    /// Constrained DOFs are removed from both matrices. Right-hand side contributions are
    /// ignored.
    pub fn assemble_generalized(&self, model: &Model, formulation: &Formulation) -> eyre::Result<GeneralizedSystem> {
        let (numbering, contributions) =
            self.local_contributions(model, formulation, &[TermKind::Stiffness, TermKind::Mass])?;
        let (stiffness, _) = scatter(&numbering, &contributions, TermKind::Stiffness);
        let (mass, _) = scatter(&numbering, &contributions, TermKind::Mass);
        debug!(
            "Assembled generalized system with {} unknowns ({} / {} non-zeros)",
            numbering.num_unknowns(),
            stiffness.nnz(),
            mass.nnz()
        );
        Ok(GeneralizedSystem {
            stiffness,
            mass,
            numbering,
        })
    }

    fn local_contributions(
        &self,
        model: &Model,
        formulation: &Formulation,
        kinds: &[TermKind],
    ) -> eyre::Result<(DofNumbering, Vec<LocalContribution>)> {
        let mesh = model.mesh();
        let discretizations = model.discretizations();
        let parameters = model.parameter_values();
        let terms = formulation
            .terms()
            .iter()
            .filter(|term| kinds.contains(&term.kind))
            .map(|term| prepare_term(model, &discretizations, term))
            .collect_vec();

        let mut support: BTreeMap<FieldId, BTreeSet<usize>> = BTreeMap::new();
        for term in &terms {
            for &field in &term.fields[..term.num_placeholder_fields] {
                support
                    .entry(field)
                    .or_default()
                    .extend(term.domains.iter().map(Domain::face));
            }
        }
        let numbering = DofNumbering::build(
            mesh,
            model.regions(),
            model.fields(),
            &discretizations,
            &support,
            &parameters,
        );

        let items = terms
            .iter()
            .flat_map(|term| term.domains.iter().map(move |domain| (term, domain)))
            .collect_vec();
        let compute = |&(term, domain): &(&PreparedTerm, &Domain)| {
            let mut ws = self.workspace.get_or_default().borrow_mut();
            compute_local_contribution(
                model,
                &discretizations,
                &parameters,
                &numbering,
                term,
                domain,
                &mut ws,
            )
        };
        let contributions = if self.settings.parallel {
            items
                .par_iter()
                .with_min_len(16)
                .map(compute)
                .collect::<eyre::Result<Vec<_>>>()?
        } else {
            items.iter().map(compute).collect::<eyre::Result<Vec<_>>>()?
        };
        Ok((numbering, contributions))
    }
}

/// Assembles the stiffness terms of a formulation with default settings.
pub fn assemble(model: &Model, formulation: &Formulation) -> eyre::Result<LinearSystem> {
    Assembler::default().assemble(model, formulation)
}

fn prepare_term(model: &Model, discretizations: &[FieldDiscretization], term: &Term) -> PreparedTerm {
    let monomials = linearize(&term.integrand);
    let domains = integration_domains(model.mesh(), &model.resolve_region(term.region));

    let placeholder_fields = monomials
        .iter()
        .flat_map(|m| m.unknown.iter().chain(m.test.iter()).map(|leaf| leaf.field))
        .sorted()
        .dedup()
        .collect_vec();
    let value_fields = monomials
        .iter()
        .flat_map(|m| m.coefficient.field_leaves())
        .map(|leaf| leaf.field)
        .filter(|field| !placeholder_fields.contains(field))
        .sorted()
        .dedup()
        .collect_vec();

    let max_face_order = |field: FieldId| {
        let discretization = &discretizations[field.0];
        let max_order = (0..model.mesh().faces().len())
            .map(|face| discretization.face_order(face))
            .max()
            .unwrap_or(0);
        discretization
            .field_type()
            .family()
            .polynomial_degree(max_order)
    };
    let estimated = monomials
        .iter()
        .map(|m| m.degree(&max_face_order))
        .max()
        .unwrap_or(0) as i64;
    let degree = (estimated + term.integration_order_delta as i64).clamp(0, MAX_QUADRATURE_DEGREE as i64) as usize;

    let num_placeholder_fields = placeholder_fields.len();
    let mut fields = placeholder_fields;
    fields.extend(value_fields);
    PreparedTerm {
        kind: term.kind,
        monomials,
        domains,
        fields,
        num_placeholder_fields,
        degree,
    }
}

fn compute_local_contribution(
    model: &Model,
    discretizations: &[FieldDiscretization],
    parameters: &[f64],
    numbering: &DofNumbering,
    term: &PreparedTerm,
    domain: &Domain,
    workspace: &mut AssemblyWorkspace,
) -> eyre::Result<LocalContribution> {
    let mesh = model.mesh();
    let face = domain.face();
    let AssemblyWorkspace { points, fields } = workspace;
    quadrature_points(mesh, domain, term.degree, points)?;

    fields.clear();
    fields.extend(term.fields.iter().map(|&field| {
        FaceField::new(mesh, face, field, &model.fields()[field.0], &discretizations[field.0])
    }));

    let placeholder_fields = &term.fields[..term.num_placeholder_fields];
    let offsets = fields[..term.num_placeholder_fields]
        .iter()
        .scan(0, |offset, field| {
            let current = *offset;
            *offset += field.num_local_dofs();
            Some(current)
        })
        .collect_vec();
    let n: usize = fields[..term.num_placeholder_fields]
        .iter()
        .map(FaceField::num_local_dofs)
        .sum();
    let position = |field: FieldId| {
        placeholder_fields
            .iter()
            .position(|&f| f == field)
            .unwrap_or_else(|| unreachable!("placeholder field is part of the term"))
    };

    let mut matrix = DMatrix::zeros(n, n);
    let mut vector = DVector::zeros(n);
    for point in points.iter() {
        for field in fields.iter_mut() {
            field.evaluate_at(point);
        }
        let env = PointEnvironment {
            point,
            parameters,
            fields: &fields[..],
        };
        for monomial in &term.monomials {
            let Some(test) = monomial.test else { continue };
            let c = point.weight * evaluate(&monomial.coefficient, &env);
            if c == 0.0 {
                continue;
            }
            let t_index = position(test.field);
            let (test_field, t_offset) = (&fields[t_index], offsets[t_index]);
            match monomial.unknown {
                Some(unknown) => {
                    let u_index = position(unknown.field);
                    let (unknown_field, u_offset) = (&fields[u_index], offsets[u_index]);
                    for i in 0..test_field.num_local_dofs() {
                        let t = test_field.shape_value(i, &test);
                        if t == 0.0 {
                            continue;
                        }
                        for j in 0..unknown_field.num_local_dofs() {
                            let u = unknown_field.shape_value(j, &unknown);
                            matrix[(t_offset + i, u_offset + j)] += c * t * u;
                        }
                    }
                }
                None => {
                    for i in 0..test_field.num_local_dofs() {
                        vector[t_offset + i] += c * test_field.shape_value(i, &test);
                    }
                }
            }
        }
    }

    let mut dofs = Vec::with_capacity(n);
    for (&field_id, field) in placeholder_fields.iter().zip(fields.iter()) {
        for &key in field.keys() {
            let dof = DofKey { field: field_id, key };
            let global = numbering
                .lookup(&dof)
                .ok_or_else(|| eyre!("DOF {:?} of face {} is missing from the numbering", dof, face))?;
            dofs.push(global);
        }
    }

    Ok(LocalContribution {
        kind: term.kind,
        dofs,
        matrix,
        vector,
    })
}

/// Scatters the contributions of one kind, in order, into a CSR matrix and a right-hand side.
fn scatter(numbering: &DofNumbering, contributions: &[LocalContribution], kind: TermKind) -> (CsrMatrix<f64>, DVector<f64>) {
    let n = numbering.num_unknowns();
    let mut coo = CooMatrix::new(n, n);
    let mut rhs = DVector::zeros(n);
    for local in contributions.iter().filter(|local| local.kind == kind) {
        for (i, row) in local.dofs.iter().enumerate() {
            let GlobalDof::Free(r) = *row else { continue };
            for (j, column) in local.dofs.iter().enumerate() {
                let k_ij = local.matrix[(i, j)];
                if k_ij == 0.0 {
                    continue;
                }
                match *column {
                    GlobalDof::Free(c) => coo.push(r, c, k_ij),
                    GlobalDof::Fixed(value) => rhs[r] -= k_ij * value,
                }
            }
            rhs[r] -= local.vector[i];
        }
    }
    (CsrMatrix::from(&coo), rhs)
}
