// ============================================================
// Layer 5 — Recurrent Cells (GRU / LSTM)
// ============================================================
// One recurrent layer that returns its hidden state at EVERY
// timestep, with the two kinds of dropout a recurrent decoder
// needs:
//
//   input dropout     — one mask per sequence on the inputs
//   recurrent dropout — one mask per sequence on the state fed
//                       back into the recurrent weights
//
// Masks are drawn once per sequence and reused at every step
// (variational dropout), and only when autodiff is enabled, so
// evaluation on the inner backend is deterministic.
//
// Input projections for all timesteps are computed in a single
// matmul before the loop; only the recurrent part is sequential.
//
// GRU (reset applied before the recurrent candidate matmul):
//   z  = σ(x·Wz + h·Uz + bz)
//   r  = σ(x·Wr + h·Ur + br)
//   h̃  = tanh(x·Wh + (r ⊙ h)·Uh + bh)
//   h' = z ⊙ h + (1 − z) ⊙ h̃
//
// LSTM:
//   i, f, g, o = σ, σ, tanh, σ of (x·W + h·U + b)
//   c' = f ⊙ c + i ⊙ g
//   h' = o ⊙ tanh(c')

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::{activation::sigmoid, Distribution},
};

use crate::domain::config::RnnCellKind;

/// Order in which a layer walks the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reversed,
}

/// Inverted-dropout mask shared by all timesteps, or None when inactive.
fn sequence_mask<B: Backend>(
    rate:   f64,
    shape:  [usize; 2],
    device: &B::Device,
) -> Option<Tensor<B, 2>> {
    if rate <= 0.0 || !B::ad_enabled() {
        return None;
    }
    let keep = 1.0 - rate;
    Some(Tensor::<B, 2>::random(shape, Distribution::Bernoulli(keep), device) / keep)
}

/// Columns `[index * width, (index + 1) * width)` of a fused gate tensor.
fn gate<B: Backend>(fused: &Tensor<B, 2>, index: usize, width: usize) -> Tensor<B, 2> {
    let [batch, _] = fused.dims();
    fused.clone().slice([0..batch, index * width..(index + 1) * width])
}

trait RecurrentCell<B: Backend> {
    type State: Clone;

    fn d_hidden(&self) -> usize;

    /// Time-distributed input projection: [b, t, d_in] → [b, t, gates * d_hidden]
    fn project_inputs(&self, input: Tensor<B, 3>) -> Tensor<B, 3>;

    fn initial_state(&self, batch: usize, device: &B::Device) -> Self::State;

    fn step(
        &self,
        projected:      Tensor<B, 2>,
        state:          Self::State,
        recurrent_mask: Option<&Tensor<B, 2>>,
    ) -> Self::State;

    fn hidden(state: &Self::State) -> Tensor<B, 2>;
}

fn unroll<B: Backend, C: RecurrentCell<B>>(
    cell:      &C,
    input:     Tensor<B, 3>,
    direction: Direction,
    dropout:   f64,
) -> Tensor<B, 3> {
    let [batch, seq_len, d_input] = input.dims();
    let device = input.device();

    let input = match sequence_mask::<B>(dropout, [batch, d_input], &device) {
        Some(mask) => input * mask.unsqueeze_dim::<3>(1).repeat_dim(1, seq_len),
        None => input,
    };
    let recurrent_mask = sequence_mask::<B>(dropout, [batch, cell.d_hidden()], &device);

    let projected = cell.project_inputs(input);
    let mut state = cell.initial_state(batch, &device);
    let mut outputs = Vec::with_capacity(seq_len);

    let steps: Vec<usize> = match direction {
        Direction::Forward  => (0..seq_len).collect(),
        Direction::Reversed => (0..seq_len).rev().collect(),
    };
    for t in steps {
        let x_t = projected.clone().slice([0..batch, t..t + 1]).squeeze::<2>(1);
        state = cell.step(x_t, state, recurrent_mask.as_ref());
        outputs.push(C::hidden(&state));
    }

    // Outputs are always returned in forward time order.
    if direction == Direction::Reversed {
        outputs.reverse();
    }
    Tensor::stack(outputs, 1)
}

// ─── GRU ──────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    /// x → [update | reset | candidate]
    input_gates:         Linear<B>,
    /// h → [update | reset], no bias
    recurrent_gates:     Linear<B>,
    /// (r ⊙ h) → candidate, no bias
    recurrent_candidate: Linear<B>,
    d_hidden:            usize,
}

impl<B: Backend> GruCell<B> {
    fn new(device: &B::Device, d_input: usize, d_hidden: usize) -> Self {
        Self {
            input_gates: LinearConfig::new(d_input, 3 * d_hidden).init(device),
            recurrent_gates: LinearConfig::new(d_hidden, 2 * d_hidden)
                .with_bias(false)
                .init(device),
            recurrent_candidate: LinearConfig::new(d_hidden, d_hidden)
                .with_bias(false)
                .init(device),
            d_hidden,
        }
    }
}

impl<B: Backend> RecurrentCell<B> for GruCell<B> {
    type State = Tensor<B, 2>;

    fn d_hidden(&self) -> usize {
        self.d_hidden
    }

    fn project_inputs(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        self.input_gates.forward(input)
    }

    fn initial_state(&self, batch: usize, device: &B::Device) -> Self::State {
        Tensor::zeros([batch, self.d_hidden], device)
    }

    fn step(
        &self,
        projected:      Tensor<B, 2>,
        hidden:         Self::State,
        recurrent_mask: Option<&Tensor<B, 2>>,
    ) -> Self::State {
        let h = self.d_hidden;
        let h_in = match recurrent_mask {
            Some(mask) => hidden.clone() * mask.clone(),
            None => hidden.clone(),
        };
        let recurrent = self.recurrent_gates.forward(h_in.clone());

        let update = sigmoid(gate(&projected, 0, h) + gate(&recurrent, 0, h));
        let reset  = sigmoid(gate(&projected, 1, h) + gate(&recurrent, 1, h));
        let candidate = (gate(&projected, 2, h)
            + self.recurrent_candidate.forward(reset * h_in))
            .tanh();

        update.clone() * hidden + update.neg().add_scalar(1.0) * candidate
    }

    fn hidden(state: &Self::State) -> Tensor<B, 2> {
        state.clone()
    }
}

// ─── LSTM ─────────────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct LstmState<B: Backend> {
    pub hidden: Tensor<B, 2>,
    pub cell:   Tensor<B, 2>,
}

#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    /// x → [input | forget | cell | output]
    input_gates:     Linear<B>,
    /// h → [input | forget | cell | output], no bias
    recurrent_gates: Linear<B>,
    d_hidden:        usize,
}

impl<B: Backend> LstmCell<B> {
    fn new(device: &B::Device, d_input: usize, d_hidden: usize) -> Self {
        Self {
            input_gates: LinearConfig::new(d_input, 4 * d_hidden).init(device),
            recurrent_gates: LinearConfig::new(d_hidden, 4 * d_hidden)
                .with_bias(false)
                .init(device),
            d_hidden,
        }
    }
}

impl<B: Backend> RecurrentCell<B> for LstmCell<B> {
    type State = LstmState<B>;

    fn d_hidden(&self) -> usize {
        self.d_hidden
    }

    fn project_inputs(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        self.input_gates.forward(input)
    }

    fn initial_state(&self, batch: usize, device: &B::Device) -> Self::State {
        LstmState {
            hidden: Tensor::zeros([batch, self.d_hidden], device),
            cell:   Tensor::zeros([batch, self.d_hidden], device),
        }
    }

    fn step(
        &self,
        projected:      Tensor<B, 2>,
        state:          Self::State,
        recurrent_mask: Option<&Tensor<B, 2>>,
    ) -> Self::State {
        let h = self.d_hidden;
        let h_in = match recurrent_mask {
            Some(mask) => state.hidden * mask.clone(),
            None => state.hidden,
        };
        let gates = projected + self.recurrent_gates.forward(h_in);

        let input  = sigmoid(gate(&gates, 0, h));
        let forget = sigmoid(gate(&gates, 1, h));
        let cell   = gate(&gates, 2, h).tanh();
        let output = sigmoid(gate(&gates, 3, h));

        let cell = forget * state.cell + input * cell;
        let hidden = output * cell.clone().tanh();
        LstmState { hidden, cell }
    }

    fn hidden(state: &Self::State) -> Tensor<B, 2> {
        state.hidden.clone()
    }
}

// ─── RecurrentLayer ───────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct RecurrentLayerConfig {
    pub kind:     RnnCellKind,
    pub d_input:  usize,
    pub d_hidden: usize,
}

impl RecurrentLayerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RecurrentLayer<B> {
        match self.kind {
            RnnCellKind::Gru  => RecurrentLayer::Gru(GruCell::new(device, self.d_input, self.d_hidden)),
            RnnCellKind::Lstm => RecurrentLayer::Lstm(LstmCell::new(device, self.d_input, self.d_hidden)),
        }
    }
}

/// A GRU or LSTM layer, chosen once from the configured cell kind.
#[derive(Module, Debug)]
pub enum RecurrentLayer<B: Backend> {
    Gru(GruCell<B>),
    Lstm(LstmCell<B>),
}

impl<B: Backend> RecurrentLayer<B> {
    pub fn kind(&self) -> RnnCellKind {
        match self {
            Self::Gru(_)  => RnnCellKind::Gru,
            Self::Lstm(_) => RnnCellKind::Lstm,
        }
    }

    pub fn d_hidden(&self) -> usize {
        match self {
            Self::Gru(cell)  => cell.d_hidden,
            Self::Lstm(cell) => cell.d_hidden,
        }
    }

    /// Forward: [batch, seq_len, d_input] → [batch, seq_len, d_hidden]
    pub fn forward(&self, input: Tensor<B, 3>, direction: Direction, dropout: f64) -> Tensor<B, 3> {
        match self {
            Self::Gru(cell)  => unroll(cell, input, direction, dropout),
            Self::Lstm(cell) => unroll(cell, input, direction, dropout),
        }
    }
}
