/// A checkbox on the settings panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    Animation,
    Ik,
    Outline,
    Physics,
    ShowIkBones,
    ShowRigidBodies,
}

impl Toggle {
    /// Panel order
    pub const ALL: [Toggle; 6] = [
        Toggle::Animation,
        Toggle::Ik,
        Toggle::Outline,
        Toggle::Physics,
        Toggle::ShowIkBones,
        Toggle::ShowRigidBodies,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Toggle::Animation => "animation",
            Toggle::Ik => "ik",
            Toggle::Outline => "outline",
            Toggle::Physics => "physics",
            Toggle::ShowIkBones => "show IK bones",
            Toggle::ShowRigidBodies => "show rigid bodies",
        }
    }

    pub fn default_value(self) -> bool {
        !matches!(self, Toggle::ShowIkBones | Toggle::ShowRigidBodies)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Current value of every toggle. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    values: [bool; 6],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            values: Toggle::ALL.map(Toggle::default_value),
        }
    }
}

impl Settings {
    pub fn get(&self, toggle: Toggle) -> bool {
        self.values[toggle.index()]
    }

    pub fn set(&mut self, toggle: Toggle, value: bool) {
        self.values[toggle.index()] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_and_defaults() {
        let expected = [
            ("animation", true),
            ("ik", true),
            ("outline", true),
            ("physics", true),
            ("show IK bones", false),
            ("show rigid bodies", false),
        ];
        let settings = Settings::default();

        for (toggle, (label, value)) in Toggle::ALL.iter().zip(expected) {
            assert_eq!(toggle.label(), label);
            assert_eq!(settings.get(*toggle), value);
        }
    }

    #[test]
    fn test_set_changes_only_one_value() {
        let mut settings = Settings::default();
        settings.set(Toggle::ShowIkBones, true);

        for toggle in Toggle::ALL {
            let expected = toggle == Toggle::ShowIkBones || toggle.default_value();
            assert_eq!(settings.get(toggle), expected);
        }
    }
}
