//! Per-channel ramp state.
//!
//! Every output channel walks its code linearly from a start code to an end code
//! over a fixed number of steps, one step per controller tick. The integer step
//! size leaves a residue when the span doesn't divide evenly, so the final step
//! always lands exactly on the end code.

use crate::Error;

/// Direction of a ramp.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// End code above the start code.
    Up,
    /// End code below the start code.
    Down,
    /// Start and end codes are equal.
    #[default]
    Flat,
}

impl Direction {
    fn between(start: u16, end: u16) -> Self {
        match end.cmp(&start) {
            core::cmp::Ordering::Greater => Self::Up,
            core::cmp::Ordering::Less => Self::Down,
            core::cmp::Ordering::Equal => Self::Flat,
        }
    }

    /// Signed unit for the direction (`1`, `-1` or `0`).
    pub fn signum(self) -> i8 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
            Direction::Flat => 0,
        }
    }
}

/// Ramp parameters for one channel, as sent by the host.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ramp {
    /// Code output before the first step.
    pub start_code: u16,
    /// Code output after the last step.
    pub end_code: u16,
    /// Number of steps from start to end. Must be at least 1.
    pub step_count: u16,
    /// Freeze at the end code once the ramp is complete.
    pub hold_at_end: bool,
}

/// Ramp and output state of a single channel.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    start_code: u16,
    end_code: u16,
    step_count: u16,
    current_step: u16,
    step_delta: i32,
    current_code: u16,
    last_read_code: u16,
    hold_at_end: bool,
    direction: Direction,
}

impl ChannelState {
    /// A channel at code 0 with a completed, zero-length ramp.
    pub const IDLE: Self = Self {
        start_code: 0,
        end_code: 0,
        step_count: 1,
        current_step: 1,
        step_delta: 0,
        current_code: 0,
        last_read_code: 0,
        hold_at_end: true,
        direction: Direction::Flat,
    };

    fn configure(&mut self, ramp: Ramp) {
        let span = i32::from(ramp.end_code) - i32::from(ramp.start_code);
        self.start_code = ramp.start_code;
        self.end_code = ramp.end_code;
        self.step_count = ramp.step_count;
        self.current_step = 0;
        self.step_delta = span / i32::from(ramp.step_count);
        self.current_code = ramp.start_code;
        self.hold_at_end = ramp.hold_at_end;
        self.direction = Direction::between(ramp.start_code, ramp.end_code);
    }

    fn advance(&mut self) -> u16 {
        if self.current_step < self.step_count {
            self.current_step += 1;
            self.current_code = if self.current_step == self.step_count {
                self.end_code
            } else {
                (i32::from(self.current_code) + self.step_delta).clamp(0, i32::from(u16::MAX))
                    as u16
            };
        }
        // Once complete the channel holds at the end code whether or not
        // `hold_at_end` is set. No reverse or repeating ramp is defined.
        self.current_code
    }

    /// Code currently latched for output.
    pub fn current_code(&self) -> u16 {
        self.current_code
    }

    /// Code most recently read back from the DAC.
    pub fn last_read_code(&self) -> u16 {
        self.last_read_code
    }

    /// Start code of the configured ramp.
    pub fn start_code(&self) -> u16 {
        self.start_code
    }

    /// End code of the configured ramp.
    pub fn end_code(&self) -> u16 {
        self.end_code
    }

    /// Total number of steps in the ramp.
    pub fn step_count(&self) -> u16 {
        self.step_count
    }

    /// Number of steps taken so far.
    pub fn current_step(&self) -> u16 {
        self.current_step
    }

    /// Signed per-step increment.
    pub fn step_delta(&self) -> i32 {
        self.step_delta
    }

    /// Whether the channel freezes at the end code.
    pub fn hold_at_end(&self) -> bool {
        self.hold_at_end
    }

    /// Direction of the ramp.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// True once every step of the ramp has been taken.
    pub fn is_complete(&self) -> bool {
        self.current_step >= self.step_count
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Fixed-size array of channel states, indexed by global channel number.
///
/// Channel `i` belongs to chip `i / channels_per_chip`; see [`FanOut`].
///
/// [`FanOut`]: crate::FanOut
#[derive(Debug, Clone)]
pub struct Channels<const N: usize> {
    states: [ChannelState; N],
}

impl<const N: usize> Default for Channels<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Channels<N> {
    /// Create `N` idle channels at code 0.
    pub const fn new() -> Self {
        Self {
            states: [ChannelState::IDLE; N],
        }
    }

    /// Number of channels.
    pub const fn len(&self) -> usize {
        N
    }

    /// True if there are no channels.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// State of a single channel.
    pub fn get(&self, index: usize) -> Option<&ChannelState> {
        self.states.get(index)
    }

    /// Iterate over all channel states in index order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ChannelState> {
        self.states.iter()
    }

    fn state_mut(&mut self, index: usize) -> Result<&mut ChannelState, Error> {
        self.states
            .get_mut(index)
            .ok_or(Error::ChannelOutOfRange(index))
    }

    /// Set up a new ramp on a channel.
    ///
    /// The channel is reset to step 0 at the start code. Nothing is changed if the
    /// index is out of range or the step count is zero.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`] or [`Error::ZeroStepCount`].
    pub fn configure(&mut self, index: usize, ramp: Ramp) -> Result<(), Error> {
        let state = self.state_mut(index)?;
        if ramp.step_count == 0 {
            return Err(Error::ZeroStepCount);
        }
        state.configure(ramp);
        debug!(
            "channel {}: ramp {} -> {} in {} steps",
            index, ramp.start_code, ramp.end_code, ramp.step_count
        );
        Ok(())
    }

    /// Take one ramp step on a channel, returning its new code.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`].
    pub fn advance(&mut self, index: usize) -> Result<u16, Error> {
        Ok(self.state_mut(index)?.advance())
    }

    /// Take one ramp step on every channel, in index order.
    pub fn advance_all(&mut self) {
        for state in self.states.iter_mut() {
            state.advance();
        }
    }

    /// Set a channel straight to `code`, replacing any ramp in progress.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`].
    pub fn set_code(&mut self, index: usize, code: u16) -> Result<(), Error> {
        let state = self.state_mut(index)?;
        let last_read_code = state.last_read_code;
        *state = ChannelState {
            start_code: code,
            end_code: code,
            current_code: code,
            last_read_code,
            ..ChannelState::IDLE
        };
        Ok(())
    }

    /// Record the code read back from the DAC for a channel.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`].
    pub fn record_read(&mut self, index: usize, code: u16) -> Result<(), Error> {
        self.state_mut(index)?.last_read_code = code;
        Ok(())
    }

    /// True when every channel has finished its ramp.
    pub fn all_complete(&self) -> bool {
        self.states.iter().all(ChannelState::is_complete)
    }
}
