//! The setup wizard state machine.
//!
//! The wizard walks a session through index setup: configuration file,
//! RPC reachability, bloom download, index download, done. Persistence of
//! the surrounding session (window position, routes) is a collaborator's
//! concern; the states serialize with serde so a session store can embed
//! them.
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizState {
    #[default]
    #[serde(rename = "welcome")]
    Welcome,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "tomlOkay")]
    TomlOkay,
    #[serde(rename = "rpcOkay")]
    RpcOkay,
    #[serde(rename = "bloomsOkay")]
    BloomsOkay,
    #[serde(rename = "indexOkay")]
    IndexOkay,
    #[serde(rename = "okay")]
    Okay,
}

/// Step order. `Error` sits between `Welcome` and `TomlOkay` so that
/// `Next` recovers from it, while `Previous` from `TomlOkay` jumps
/// straight back to `Welcome`.
const STATE_ORDER: [WizState; 7] = [
    WizState::Welcome,
    WizState::Error,
    WizState::TomlOkay,
    WizState::RpcOkay,
    WizState::BloomsOkay,
    WizState::IndexOkay,
    WizState::Okay,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizStep {
    Reset,
    Previous,
    Next,
    Finish,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wizard {
    pub state: WizState,
}

impl Wizard {
    pub fn step(&mut self, step: WizStep) {
        match step {
            WizStep::Reset => self.state = WizState::Error,
            WizStep::Previous => {
                if self.state == WizState::TomlOkay {
                    self.state = WizState::Welcome;
                } else if let Some(i) = position(self.state) {
                    if i > 0 {
                        self.state = STATE_ORDER[i - 1];
                    }
                }
            }
            WizStep::Next => {
                if self.state == WizState::Welcome {
                    self.state = WizState::TomlOkay;
                } else if let Some(i) = position(self.state) {
                    if i < STATE_ORDER.len() - 1 {
                        self.state = STATE_ORDER[i + 1];
                    }
                }
            }
            WizStep::Finish => self.state = WizState::Okay,
        }
    }
}

fn position(state: WizState) -> Option<usize> {
    STATE_ORDER.iter().position(|s| *s == state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_path_reaches_okay() {
        let mut wizard = Wizard::default();
        let expected = [
            WizState::TomlOkay,
            WizState::RpcOkay,
            WizState::BloomsOkay,
            WizState::IndexOkay,
            WizState::Okay,
        ];
        for state in expected {
            wizard.step(WizStep::Next);
            assert_eq!(wizard.state, state);
        }
        // Okay is terminal under Next.
        wizard.step(WizStep::Next);
        assert_eq!(wizard.state, WizState::Okay);
    }

    #[test]
    fn previous_from_toml_skips_error() {
        let mut wizard = Wizard {
            state: WizState::TomlOkay,
        };
        wizard.step(WizStep::Previous);
        assert_eq!(wizard.state, WizState::Welcome);
    }

    #[test]
    fn reset_reaches_error_from_anywhere_and_next_recovers() {
        for state in STATE_ORDER {
            let mut wizard = Wizard { state };
            wizard.step(WizStep::Reset);
            assert_eq!(wizard.state, WizState::Error);
            wizard.step(WizStep::Next);
            assert_eq!(wizard.state, WizState::TomlOkay);
        }
    }

    #[test]
    fn finish_is_a_jump_to_okay() {
        let mut wizard = Wizard {
            state: WizState::RpcOkay,
        };
        wizard.step(WizStep::Finish);
        assert_eq!(wizard.state, WizState::Okay);
    }

    #[test]
    fn states_serialize_with_wire_names() {
        assert_eq!(
            serde_json::to_string(&WizState::BloomsOkay).unwrap(),
            "\"bloomsOkay\""
        );
        let back: WizState = serde_json::from_str("\"tomlOkay\"").unwrap();
        assert_eq!(back, WizState::TomlOkay);
    }
}
