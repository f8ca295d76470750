use crate::core::lattice::classify::classify;
use crate::core::lattice::geometry::ExplicitLattice;
use crate::core::lattice::units::{AtomicUnit, LengthUnit};
use crate::core::models::card::AtomicPositionsCard;
use crate::core::models::explicit::ExplicitLatticeModel;
use crate::core::models::ids::{AtomId, OriginIndex};
use crate::core::models::listeners::{Observable, Subscription};
use crate::core::models::structure::StructuralModel;
use crate::core::models::symbolic::SymbolicLatticeModel;
use crate::engine::atom_sync::{AtomicPositionSynchronizer, SyncDirection};
use crate::engine::config::SyncConfig;
use crate::engine::confirm::{AlwaysConfirm, Confirmation};
use crate::engine::feedback::{Feedback, FeedbackReporter};
use crate::engine::guard::SyncStats;
use crate::engine::lattice_sync::LatticeSynchronizer;
use crate::engine::mailbox::{Mailbox, RemoteHandle, RemoteRequest};
use std::rc::Rc;
use tracing::{info, instrument, warn};

/// The three input-side models of one cell.
#[derive(Debug, Clone, Default)]
pub struct InputDocument {
    pub symbolic: Rc<SymbolicLatticeModel>,
    pub explicit: Rc<ExplicitLatticeModel>,
    pub positions: Rc<AtomicPositionsCard>,
}

impl InputDocument {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct BindOptions {
    pub config: SyncConfig,
    pub confirmation: Rc<dyn Confirmation>,
    pub feedback: FeedbackReporter,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            config: SyncConfig::default(),
            confirmation: Rc::new(AlwaysConfirm),
            feedback: FeedbackReporter::new(),
        }
    }
}

impl BindOptions {
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_confirmation(mut self, confirmation: impl Confirmation + 'static) -> Self {
        self.confirmation = Rc::new(confirmation);
        self
    }

    pub fn with_feedback(mut self, callback: impl Fn(Feedback) + 'static) -> Self {
        self.feedback = FeedbackReporter::with_callback(Box::new(callback));
        self
    }
}

/// A live cell: the input models, the structural model and the two synchronizers
/// that keep them consistent.
///
/// The binding owns every listener it registers. Dropping it detaches them all and
/// leaves the models as they were at that moment.
pub struct CellBinding {
    subscriptions: Vec<Subscription>,
    document: InputDocument,
    structure: Rc<StructuralModel>,
    lattice: Rc<LatticeSynchronizer>,
    atoms: Rc<AtomicPositionSynchronizer>,
    mailbox: Mailbox,
}

impl CellBinding {
    /// Builds a fresh structure from an input document and binds the two.
    ///
    /// The lattice is resolved from the symbolic description (and the explicit
    /// vectors for a free lattice); every card entry becomes a structural atom. If
    /// the lattice does not resolve yet, atoms in lattice-dependent units are
    /// created at the origin and placed as soon as it does.
    #[instrument(skip_all, name = "cell_binding.materialize")]
    pub fn materialize(document: InputDocument, options: BindOptions) -> Self {
        let binding = Self::bind(document, Rc::new(StructuralModel::new()), options);
        if !binding.lattice.resync_from_input() {
            warn!("Input lattice does not resolve; structure created without a lattice.");
        }
        binding
            .atoms
            .action_for_all_atoms(SyncDirection::CardToStructure);
        info!(atoms = binding.structure.len(), "Structure materialized from input.");
        binding
    }

    /// Derives an input document from an existing structure and binds the two.
    ///
    /// The lattice, if any, is classified into the most specific lattice code and
    /// written in the configured parameter form, the explicit vectors are written
    /// in Angstrom, and the card lists the atoms in crystal coordinates (Angstrom
    /// when there is no lattice).
    #[instrument(skip_all, name = "cell_binding.from_structure")]
    pub fn from_structure(structure: Rc<StructuralModel>, options: BindOptions) -> Self {
        let document = InputDocument::new();
        let lattice = structure.copy_lattice();
        match lattice {
            Some(matrix) => {
                let (bravais, params) = classify(&matrix, options.config.classify_tolerance);
                document
                    .symbolic
                    .write_params(bravais, &params, options.config.parameter_form);
                let alat = params
                    .a
                    .filter(|a| *a > 0.0)
                    .unwrap_or_else(|| matrix.row(0).norm());
                if let Ok(vectors) =
                    ExplicitLattice::from_matrix(&matrix, LengthUnit::Angstrom, Some(alat))
                {
                    document.explicit.assign(vectors);
                }
                document.positions.set_unit(AtomicUnit::Crystal);
                info!(%bravais, "Structure lattice classified.");
            }
            None => document.positions.set_unit(AtomicUnit::Angstrom),
        }
        let binding = Self::bind(document, structure, options);
        if lattice.is_some() {
            binding.lattice.resync_from_input();
        }
        binding
            .atoms
            .action_for_all_atoms(SyncDirection::StructureToCard);
        binding
    }

    fn bind(document: InputDocument, structure: Rc<StructuralModel>, options: BindOptions) -> Self {
        let BindOptions {
            config,
            confirmation,
            feedback,
        } = options;
        let atoms = Rc::new(AtomicPositionSynchronizer::new(
            document.symbolic.clone(),
            document.explicit.clone(),
            document.positions.clone(),
            structure.clone(),
            confirmation.clone(),
            feedback,
            config.clone(),
        ));
        let lattice = Rc::new(LatticeSynchronizer::new(
            document.symbolic.clone(),
            document.explicit.clone(),
            structure.clone(),
            atoms.clone(),
            confirmation,
            config,
        ));
        let subscriptions = vec![
            Subscription::attach(
                &document.symbolic,
                forward(&lattice, LatticeSynchronizer::on_symbolic_changed),
            ),
            Subscription::attach(
                &document.explicit,
                forward(&lattice, LatticeSynchronizer::on_explicit_changed),
            ),
            Subscription::attach(
                &structure,
                forward(&lattice, LatticeSynchronizer::on_structure_changed),
            ),
            Subscription::attach(
                &document.positions,
                forward(&atoms, AtomicPositionSynchronizer::on_card_changed),
            ),
            Subscription::attach(
                &structure,
                forward(&atoms, AtomicPositionSynchronizer::on_structure_changed),
            ),
        ];
        Self {
            subscriptions,
            document,
            structure,
            lattice,
            atoms,
            mailbox: Mailbox::new(),
        }
    }

    pub fn document(&self) -> &InputDocument {
        &self.document
    }

    pub fn structure(&self) -> &Rc<StructuralModel> {
        &self.structure
    }

    pub fn lattice_stats(&self) -> SyncStats {
        self.lattice.stats()
    }

    pub fn atom_stats(&self) -> SyncStats {
        self.atoms.stats()
    }

    pub fn lattice_sync(&self) -> &LatticeSynchronizer {
        &self.lattice
    }

    pub fn atom_sync(&self) -> &AtomicPositionSynchronizer {
        &self.atoms
    }

    /// The structural atom tied to card entry `origin`.
    pub fn atom_at(&self, origin: OriginIndex) -> Option<AtomId> {
        self.atoms.atom_at(origin)
    }

    /// A sendable handle for posting requests from other threads.
    pub fn remote(&self) -> RemoteHandle {
        self.mailbox.handle()
    }

    /// Applies every request posted through [`CellBinding::remote`] handles so far,
    /// in order, through the ordinary model mutators. Returns how many were applied.
    #[instrument(skip_all, name = "cell_binding.process_pending")]
    pub fn process_pending(&self) -> usize {
        let requests = self.mailbox.drain();
        for request in &requests {
            match *request {
                RemoteRequest::RemoveAtom(origin) => {
                    if self.document.positions.remove(origin.index()).is_none() {
                        warn!(%origin, "Remote removal of a card entry that no longer exists.");
                    }
                }
                RemoteRequest::ResyncAll(direction) => self.atoms.action_for_all_atoms(direction),
            }
        }
        requests.len()
    }

    /// Number of listeners this binding keeps registered on the models.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

/// A listener that forwards events to a synchronizer for as long as it is alive.
fn forward<S, E>(sync: &Rc<S>, handler: fn(&S, &E)) -> impl Fn(&E) + 'static
where
    S: 'static,
    E: 'static,
{
    let sync = Rc::downgrade(sync);
    move |event: &E| {
        if let Some(sync) = sync.upgrade() {
            handler(&sync, event);
        }
    }
}

impl std::fmt::Debug for CellBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellBinding")
            .field("atoms", &self.structure.len())
            .field("structure_listeners", &self.structure.listeners().len())
            .field("lattice_stats", &self.lattice.stats())
            .field("atom_stats", &self.atoms.stats())
            .finish()
    }
}
