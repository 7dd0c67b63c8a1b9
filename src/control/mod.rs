//! Controllers: turn raw human input or a learned model's outputs into one
//! `ActuationCommand` per tick.

pub mod network;

use serde::{Deserialize, Serialize};

use crate::car::SensorReading;
pub use network::{NetworkError, NetworkParams, RaceNet};

/// Output threshold that binarizes the learned controller's outputs.
pub const OUTPUT_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuationCommand {
    pub steer_left: bool,
    pub steer_right: bool,
    pub accelerate: bool,
    pub reverse: bool,
    pub brake: bool,
}

impl ActuationCommand {
    /// Accelerate and reverse are exclusive; accelerate wins.
    pub fn normalized(mut self) -> Self {
        if self.accelerate {
            self.reverse = false;
        }
        self
    }
}

/// Raw key state as reported by the input collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanInput {
    pub left: bool,
    pub right: bool,
    pub accelerate: bool,
    pub reverse: bool,
    pub brake: bool,
}

#[derive(Debug, Clone)]
pub struct LearnedController {
    net: RaceNet,
    last_outputs: [f32; 3],
}

impl LearnedController {
    pub fn new(net: RaceNet) -> Self {
        Self { net, last_outputs: [0.0; 3] }
    }

    pub fn network(&self) -> &RaceNet {
        &self.net
    }

    /// Raw outputs of the most recent decision.
    pub fn last_outputs(&self) -> [f32; 3] {
        self.last_outputs
    }

    /// Pure mapping from a sensor reading to a command.
    pub fn decide(&self, sensors: &SensorReading) -> ([f32; 3], ActuationCommand) {
        let out = self.net.infer(sensors.controller_inputs());
        let command = ActuationCommand {
            steer_left: out[0] > OUTPUT_THRESHOLD,
            steer_right: out[1] > OUTPUT_THRESHOLD,
            accelerate: out[2] > OUTPUT_THRESHOLD,
            reverse: false,
            brake: false,
        };
        (out, command)
    }
}

#[derive(Debug, Clone)]
pub enum Controller {
    Human(HumanInput),
    Learned(LearnedController),
}

impl Controller {
    pub fn human() -> Self {
        Controller::Human(HumanInput::default())
    }

    pub fn learned(net: RaceNet) -> Self {
        Controller::Learned(LearnedController::new(net))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Controller::Human(_) => "human",
            Controller::Learned(_) => "learned",
        }
    }

    /// Replaces the held key state. Ignored by learned controllers.
    pub fn set_human_input(&mut self, input: HumanInput) -> bool {
        match self {
            Controller::Human(held) => {
                *held = input;
                true
            }
            Controller::Learned(_) => false,
        }
    }

    pub fn actuate(&mut self, sensors: &SensorReading) -> ActuationCommand {
        match self {
            Controller::Human(input) => ActuationCommand {
                steer_left: input.left,
                steer_right: input.right,
                accelerate: input.accelerate,
                reverse: input.reverse,
                brake: input.brake,
            }
            .normalized(),
            Controller::Learned(learned) => {
                let (outputs, command) = learned.decide(sensors);
                learned.last_outputs = outputs;
                command
            }
        }
    }
}
