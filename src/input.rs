#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self { key, shift: false }
    }

    pub fn shifted(key: Key) -> Self {
        Self { key, shift: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Submit,
    Edited,
}

/// Draft text of the message box.
#[derive(Debug, Clone, Default)]
pub struct InputBox {
    value: String,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    /// Enter submits. Shift+Enter inserts a newline instead.
    pub fn handle_key(&mut self, press: KeyPress) -> InputAction {
        match press.key {
            Key::Enter if !press.shift => return InputAction::Submit,
            Key::Enter => self.value.push('\n'),
            Key::Backspace => {
                self.value.pop();
            }
            Key::Char(c) => self.value.push(c),
        }
        InputAction::Edited
    }
}
