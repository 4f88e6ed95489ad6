// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! The state machine that decides which location a lookup queries next.

use std::fmt;
use std::time::Duration;

use arrayvec::ArrayVec;
use log::debug;

use crate::Error;

/// The maximum number of populator delays, and so the maximum number of
/// times the populator is polled after its first answer.
pub const MAX_POPULATOR_DELAYS: usize = 8;

/// The default delays between populator polls, in milliseconds.
pub const DEFAULT_POPULATOR_DELAYS_MS: [u64; MAX_POPULATOR_DELAYS] =
    [2000, 2000, 2000, 2000, 5000, 5000, 5000, 5000];

////////////////////////////////////////////////////////////////////////
// LOCATIONS AND STEP RESULTS                                         //
////////////////////////////////////////////////////////////////////////

/// The location that a lookup queries (or has found its record at).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Location {
    Independent,
    Hosted,
    Populator,
    None,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Independent => f.write_str("independent"),
            Self::Hosted => f.write_str("hosted"),
            Self::Populator => f.write_str("populator"),
            Self::None => f.write_str("none"),
        }
    }
}

/// The status codes a populator answers with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PopulatorStatus {
    /// The record is being created; poll again later (code 1).
    Pending,

    /// The record now exists at the independent location (code 2).
    FoundIndependent,

    /// The record now exists at the hosted location (code 3).
    FoundHosted,

    /// No record can be created (code 4).
    Absent,
}

impl TryFrom<i64> for PopulatorStatus {
    type Error = i64;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Pending),
            2 => Ok(Self::FoundIndependent),
            3 => Ok(Self::FoundHosted),
            4 => Ok(Self::Absent),
            _ => Err(code),
        }
    }
}

impl From<PopulatorStatus> for i64 {
    fn from(status: PopulatorStatus) -> Self {
        match status {
            PopulatorStatus::Pending => 1,
            PopulatorStatus::FoundIndependent => 2,
            PopulatorStatus::FoundHosted => 3,
            PopulatorStatus::Absent => 4,
        }
    }
}

/// The outcome of querying one location, fed to
/// [`LookupLocationStateMachine::step`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StepInput {
    /// A record was found.
    Found,

    /// No record (or no usable answer) was found.
    NotFound,

    /// The populator answered with a status.
    Populator(PopulatorStatus),
}

impl From<bool> for StepInput {
    fn from(found: bool) -> Self {
        if found {
            Self::Found
        } else {
            Self::NotFound
        }
    }
}

////////////////////////////////////////////////////////////////////////
// THE STATE MACHINE                                                  //
////////////////////////////////////////////////////////////////////////

/// The internal progress marker of a [`LookupLocationStateMachine`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum State {
    Indy1,
    Hosted1,
    Indy2,
    Hosted2,

    /// Polling the populator; the value is the number of polls made
    /// after the first query (0 to [`MAX_POPULATOR_DELAYS`]).
    Pop(usize),

    Error,
    Success,
}

/// Sequences the queries of a lookup.
///
/// A lookup first tries the independent location, then the hosted
/// location, then asks the populator. The populator may answer that it
/// is creating the record, in which case it is polled again after each
/// configured delay; or that the record now exists at the independent
/// or hosted location, in which case that location is tried once more.
///
/// The machine starts in the `INDY1` state. Each call to
/// [`step`](Self::step) reports the result of querying the location the
/// machine last returned, and returns the location to query next (or,
/// on success, the location where the record was found). The machine is
/// [complete](Self::is_complete) once it reaches success or error.
///
/// The number of configured delays is the polling depth: with the eight
/// default delays the populator is queried up to nine times, and with
/// no delays it is queried only once.
#[derive(Clone, Debug)]
pub struct LookupLocationStateMachine {
    state: State,
    delays: ArrayVec<Duration, MAX_POPULATOR_DELAYS>,
}

impl LookupLocationStateMachine {
    /// Creates a state machine with the default populator delays.
    pub fn new() -> Self {
        Self {
            state: State::Indy1,
            delays: DEFAULT_POPULATOR_DELAYS_MS
                .iter()
                .map(|&ms| Duration::from_millis(ms))
                .collect(),
        }
    }

    /// Creates a state machine with custom populator delays. At most
    /// [`MAX_POPULATOR_DELAYS`] delays may be given.
    pub fn with_delays(delays: &[Duration]) -> Result<Self, Error> {
        let delays = ArrayVec::try_from(delays)
            .map_err(|_| Error::TooManyPopulatorDelays(delays.len()))?;
        Ok(Self {
            state: State::Indy1,
            delays,
        })
    }

    /// Makes the machine begin at the first attempt of `location`
    /// instead of `INDY1`. This is used after a redirect, so that only
    /// the redirected location and the ones after it are queried.
    /// [`Location::None`] leaves the starting state unchanged.
    pub fn starting_at(mut self, location: Location) -> Self {
        self.state = match location {
            Location::Independent | Location::None => State::Indy1,
            Location::Hosted => State::Hosted1,
            Location::Populator => State::Pop(0),
        };
        self
    }

    /// Returns the location that the current state queries.
    pub fn location(&self) -> Location {
        location_of(self.state)
    }

    /// Returns whether the machine has reached success or error.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Success | State::Error)
    }

    /// Returns whether the machine has reached success.
    pub fn is_success(&self) -> bool {
        self.state == State::Success
    }

    /// Advances the machine with the result of the last query and
    /// returns the next location. When polling the populator, this
    /// waits for the configured delay before returning.
    pub async fn step(&mut self, input: impl Into<StepInput>) -> Result<Location, Error> {
        let input = input.into();
        let previous = self.state;
        let location = self.transition(input)?;
        debug!(
            "Lookup state machine: {:?} --[{:?}]--> {:?}.",
            previous, input, self.state,
        );

        if let (State::Pop(n), State::Pop(next)) = (previous, self.state) {
            if next == n + 1 {
                tokio::time::sleep(self.delays[n]).await;
            }
        }
        Ok(location)
    }

    /// Performs the state transition for `input`, without waiting.
    fn transition(&mut self, input: StepInput) -> Result<Location, Error> {
        if input == StepInput::Found {
            let location = match self.state {
                State::Error => Location::None,
                state => match location_of(state) {
                    Location::None => Location::Populator,
                    location => location,
                },
            };
            self.state = State::Success;
            return Ok(location);
        }

        self.state = match (self.state, input) {
            (State::Indy1, _) => State::Hosted1,
            (State::Hosted1, _) => State::Pop(0),
            (State::Pop(_), StepInput::Populator(PopulatorStatus::FoundIndependent)) => {
                State::Indy2
            }
            (State::Pop(_), StepInput::Populator(PopulatorStatus::FoundHosted)) => State::Hosted2,
            (State::Pop(_), StepInput::Populator(PopulatorStatus::Absent)) => State::Error,
            (State::Pop(n), _) if n < self.delays.len() => State::Pop(n + 1),
            (State::Pop(_), _) | (State::Indy2, _) | (State::Hosted2, _) => State::Error,
            (State::Error, _) | (State::Success, _) => {
                return Err(Error::InvalidStateTransition);
            }
        };
        Ok(self.location())
    }
}

impl Default for LookupLocationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn location_of(state: State) -> Location {
    match state {
        State::Indy1 | State::Indy2 => Location::Independent,
        State::Hosted1 | State::Hosted2 => Location::Hosted,
        State::Pop(_) => Location::Populator,
        State::Error | State::Success => Location::None,
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
