//! This Rust `embedded-hal`-based library controls the [LCD03](https://www.robot-electronics.co.uk/htm/Lcd03tech.htm)
//! serial character display from Robot Electronics over its I2C interface in an embedded,
//! `no_std` environment. The LCD03 places a small command-driven controller between the bus
//! and the LCD glass, so the driver talks a fixed command protocol rather than raw HD44780
//! timing: every operation is a short frame starting with the command register selector,
//! and the module reports its free receive-buffer space and attached 3x4 keypad state back
//! over the same bus.
//!
//! Key features include:
//! - Convenient high-level API for controlling the display
//! - Buffer-aware bulk text writes that throttle on the module's own free-space counter
//! - Support for custom characters
//! - Backlight control and the LCD03 extras (tab stops, startup message, keypad scan rate)
//! - Keypad reading with a typed bitmask
//! - In-field I2C address reprogramming
//! - `core::fmt::Write` implementation for easy use with the `write!` macro
//! - Compatible with the `embedded-hal` traits v1.0 and later
//! - Optional support for the `defmt` and `ufmt` logging frameworks
//!
//! ## Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! lcd03-i2c = { version = "0.1", features = ["defmt"] }
//! ```
//! The `features = ["defmt"]` line is optional and enables the `defmt` feature, which allows
//! the library's errors to be used with the `defmt` logging framework. Another optional
//! feature is `features = ["ufmt"]`, which enables the `uwriteln!` and `uwrite!` macros.
//!
//! Then create and initialize the driver:
//! ```rust
//! use lcd03_i2c::Lcd03;
//!
//! // board setup
//! let i2c = ...; // I2C peripheral
//! let delay = ...; // DelayNs implementation
//!
//! // factory default address (0xC6)
//! let mut lcd = Lcd03::new(i2c, delay);
//! // or with the address the module has been reprogrammed to
//! let mut lcd = Lcd03::new_with_address(i2c, 0xC8, delay);
//!
//! lcd.init()?;
//! ```
//! The 8-bit address printed on the module is what you pass here; the driver converts it to
//! the 7-bit form `embedded-hal` uses on the wire.
//!
//! Use the display:
//! ```rust
//! // set up the display
//! lcd.backlight(true)?.clear()?.home()?;
//! // print a message
//! lcd.print("Hello, world!")?;
//! // can also use the `core::fmt::write!` macro
//! use core::fmt::Write;
//!
//! write!(lcd, "Hello, world!")?;
//! ```
//! The methods for controlling the LCD return a `Result` wrapping the display object in
//! `Ok()`, allowing commands to be chained:
//! ```rust
//! lcd.backlight(true)?.clear()?.set_cursor(0, 1)?.print("Hello, world!")?;
//! ```
//! ### Reading the keypad
//! The LCD03 scans an attached 3x4 matrix keypad. `read_keypad` returns a [`KeypadState`]
//! snapshot with one flag per key:
//! ```rust
//! let keys = lcd.read_keypad()?;
//! if keys.key_5() {
//!     lcd.print("5 is held down")?;
//! }
//! ```
#![no_std]
use core::fmt::Display;

use bitfield::bitfield;
use embedded_hal::{delay::DelayNs, i2c};

mod driver;

pub use driver::DEFAULT_I2C_ADDRESS;

use driver::{
    Lcd03Device, LCD_CMD_BACKLIGHTOFF, LCD_CMD_BACKLIGHTON, LCD_CMD_BACKSPACE,
    LCD_CMD_BRIGHTNESSSET, LCD_CMD_CLEARCOLUMN, LCD_CMD_CLEARDISPLAY, LCD_CMD_CONTRASTSET,
    LCD_CMD_CURSORBLINK, LCD_CMD_CURSORDOWN, LCD_CMD_CURSORHOME, LCD_CMD_CURSOROFF,
    LCD_CMD_CURSORON, LCD_CMD_CURSORPOS, LCD_CMD_CURSORPOSXY, LCD_CMD_CURSORUP,
    LCD_CMD_CUSTOMCHAR, LCD_CMD_DISABLEMESSAGE, LCD_CMD_DISPLAYTYPE, LCD_CMD_DOUBLERATESCAN,
    LCD_CMD_ENABLEMESSAGE, LCD_CMD_LINEFEED, LCD_CMD_NORMALRATESCAN, LCD_CMD_SAVEMESSAGE,
    LCD_CMD_TAB, LCD_CMD_TABSET, LCD_CUSTOMCHAR_BASE, LCD_CUSTOMCHAR_MASK,
};

#[derive(Debug, PartialEq, Copy, Clone)]
/// Errors that can occur when using the LCD03
pub enum Lcd03Error<I2C>
where
    I2C: i2c::I2c,
{
    /// I2C error returned from the underlying I2C implementation
    I2cError(I2C::Error),
    /// Address passed to `change_address` is odd or outside `0xC6..=0xCE`
    InvalidAddress,
    /// The module never reported enough free buffer space for a write
    BufferTimeout,
    /// Formatting error
    FormattingError(core::fmt::Error),
}

impl<I2C> From<core::fmt::Error> for Lcd03Error<I2C>
where
    I2C: i2c::I2c,
{
    fn from(err: core::fmt::Error) -> Self {
        Lcd03Error::FormattingError(err)
    }
}

impl<I2C> From<&Lcd03Error<I2C>> for &'static str
where
    I2C: i2c::I2c,
{
    fn from(err: &Lcd03Error<I2C>) -> Self {
        match err {
            Lcd03Error::I2cError(_) => "I2C error",
            Lcd03Error::InvalidAddress => "Invalid device address",
            Lcd03Error::BufferTimeout => "Timed out waiting for buffer space",
            Lcd03Error::FormattingError(_) => "Formatting error",
        }
    }
}

#[cfg(feature = "defmt")]
impl<I2C> defmt::Format for Lcd03Error<I2C>
where
    I2C: i2c::I2c,
{
    fn format(&self, fmt: defmt::Formatter) {
        let msg: &'static str = From::from(self);
        defmt::write!(fmt, "{}", msg);
    }
}

#[cfg(feature = "ufmt")]
impl<I2C> ufmt::uDisplay for Lcd03Error<I2C>
where
    I2C: i2c::I2c,
{
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl<I2C> Display for Lcd03Error<I2C>
where
    I2C: i2c::I2c,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &'static str = From::from(self);
        write!(f, "{}", msg)
    }
}

bitfield! {
    /// Snapshot of the LCD03 keypad register pair. One flag per key of the
    /// 3x4 matrix keypad; a set flag means the key was down when the module
    /// last scanned the matrix.
    pub struct KeypadState(u16);
    impl Debug;
    pub key_1, _: 0;
    pub key_2, _: 1;
    pub key_3, _: 2;
    pub key_4, _: 3;
    pub key_5, _: 4;
    pub key_6, _: 5;
    pub key_7, _: 6;
    pub key_8, _: 7;
    pub key_9, _: 8;
    pub star, _: 9;
    pub key_0, _: 10;
    pub hash, _: 11;
}

impl KeypadState {
    /// The raw 12-bit mask as read from the module.
    pub fn raw(&self) -> u16 {
        self.0
    }

    /// True if any key is currently down.
    pub fn any_pressed(&self) -> bool {
        self.0 & 0x0FFF != 0
    }
}

/// Driver for one LCD03 module. Generic over the I2C bus and a delay source,
/// which is used to pace the free-buffer polling during bulk writes.
pub struct Lcd03<I2C, DELAY>
where
    I2C: i2c::I2c,
    DELAY: DelayNs,
{
    device: Lcd03Device<I2C, DELAY>,
}

impl<I2C, DELAY> Lcd03<I2C, DELAY>
where
    I2C: i2c::I2c,
    DELAY: DelayNs,
{
    /// Create a driver for a module at the factory default address.
    pub fn new(i2c: I2C, delay: DELAY) -> Self {
        Self::new_with_address(i2c, DEFAULT_I2C_ADDRESS, delay)
    }

    /// Create a driver for a module at a specific 8-bit protocol address.
    pub fn new_with_address(i2c: I2C, address: u8, delay: DELAY) -> Self {
        Self {
            device: Lcd03Device::new(i2c, address, delay),
        }
    }

    /// Initialize the display: hides the cursor and clears the screen. This
    /// must be called before using the display. The I2C bus itself must
    /// already be configured by the platform HAL.
    pub fn init(&mut self) -> Result<(), Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_CURSOROFF)?;
        self.device.command(LCD_CMD_CLEARDISPLAY)?;
        Ok(())
    }

    /// returns a reference to the I2C peripheral. mostly needed for testing
    fn i2c(&mut self) -> &mut I2C {
        self.device.i2c()
    }

    /// The 7-bit bus address currently used to reach the module.
    pub fn address(&self) -> u8 {
        self.device.address()
    }

    //--------------------------------------------------------------------------------------------------
    // high level commands, for the user!
    //--------------------------------------------------------------------------------------------------

    /// Clear the display and home the cursor.
    pub fn clear(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_CLEARDISPLAY)?;
        Ok(self)
    }

    /// Set the cursor to the home position.
    pub fn home(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_CURSORHOME)?;
        Ok(self)
    }

    /// Set the cursor position at the specified column and row. Columns and
    /// rows are zero-indexed; the module itself counts from one. Arguments
    /// beyond the display geometry wrap as u8 arithmetic on the wire.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.frame(&[
            LCD_CMD_CURSORPOSXY,
            row.wrapping_add(1),
            col.wrapping_add(1),
        ])?;
        Ok(self)
    }

    /// Set the cursor to a zero-indexed linear position, counting across
    /// rows. Positions beyond the display geometry wrap as u8 arithmetic on
    /// the wire.
    pub fn set_cursor_position(&mut self, pos: u8) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.frame(&[LCD_CMD_CURSORPOS, pos.wrapping_add(1)])?;
        Ok(self)
    }

    /// Set the underline cursor visibility.
    pub fn show_cursor(&mut self, show_cursor: bool) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(if show_cursor {
            LCD_CMD_CURSORON
        } else {
            LCD_CMD_CURSOROFF
        })?;
        Ok(self)
    }

    /// Set the cursor blinking. Turning blink off hides the cursor entirely,
    /// matching the module's command set.
    pub fn blink_cursor(&mut self, blink_cursor: bool) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(if blink_cursor {
            LCD_CMD_CURSORBLINK
        } else {
            LCD_CMD_CURSOROFF
        })?;
        Ok(self)
    }

    /// Set the display visibility. The LCD03 has no display-enable line, so
    /// this switches the backlight, provided for LiquidCrystal-style API
    /// compatibility.
    pub fn show_display(&mut self, show_display: bool) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.backlight(show_display)
    }

    /// Turn the backlight on or off.
    pub fn backlight(&mut self, on: bool) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(if on {
            LCD_CMD_BACKLIGHTON
        } else {
            LCD_CMD_BACKLIGHTOFF
        })?;
        Ok(self)
    }

    /// Move the cursor to the start of the next line.
    pub fn new_line(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_LINEFEED)?;
        Ok(self)
    }

    /// Move the cursor up one line.
    pub fn cursor_up(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_CURSORUP)?;
        Ok(self)
    }

    /// Move the cursor down one line.
    pub fn cursor_down(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_CURSORDOWN)?;
        Ok(self)
    }

    /// Clear the column under the cursor and move one position right.
    pub fn clear_column(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_CLEARCOLUMN)?;
        Ok(self)
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_BACKSPACE)?;
        Ok(self)
    }

    /// Advance the cursor to the next tab stop.
    pub fn tab(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_TAB)?;
        Ok(self)
    }

    /// Set the tab stop width, 1 to 10 columns.
    pub fn set_tab_stop(&mut self, width: u8) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.frame(&[LCD_CMD_TABSET, width])?;
        Ok(self)
    }

    /// Enable or disable the startup message the module shows at power-on.
    pub fn show_startup_message(&mut self, show: bool) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(if show {
            LCD_CMD_ENABLEMESSAGE
        } else {
            LCD_CMD_DISABLEMESSAGE
        })?;
        Ok(self)
    }

    /// Save the current display contents as the power-on startup message.
    pub fn save_startup_message(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_SAVEMESSAGE)?;
        Ok(self)
    }

    /// Double the keypad scan rate for snappier key response.
    pub fn double_keypad_scan_rate(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_DOUBLERATESCAN)?;
        Ok(self)
    }

    /// Restore the normal keypad scan rate.
    pub fn normal_keypad_scan_rate(&mut self) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.command(LCD_CMD_NORMALRATESCAN)?;
        Ok(self)
    }

    /// Create a new custom character in one of the 8 glyph slots. The
    /// location is masked to 0-7; the pattern rows are OR-ed with the
    /// high-bit mask the module expects.
    pub fn create_char(
        &mut self,
        location: u8,
        charmap: [u8; 8],
    ) -> Result<&mut Self, Lcd03Error<I2C>> {
        let mut payload = [0u8; 10];
        payload[0] = LCD_CMD_CUSTOMCHAR;
        // only 8 slots exist; remap 0-7 to the device's slot addresses
        payload[1] = (location & 0x7) + LCD_CUSTOMCHAR_BASE;
        for (dst, src) in payload[2..].iter_mut().zip(charmap.iter()) {
            *dst = src | LCD_CUSTOMCHAR_MASK;
        }
        self.device.frame(&payload)?;
        Ok(self)
    }

    /// Configure the module for the attached display glass. Supported
    /// combinations are 20x4 and 16x2 in green or blue (color matched
    /// case-insensitively), yielding device type codes 3 through 6. Returns
    /// the resolved code; an unsupported combination returns 0 and sends
    /// nothing, mirroring the module's own contract.
    pub fn set_display_type(
        &mut self,
        cols: u8,
        rows: u8,
        color: &str,
    ) -> Result<u8, Lcd03Error<I2C>> {
        let type_code = match (cols, rows) {
            (20, 4) if color.eq_ignore_ascii_case("green") => 3,
            (20, 4) if color.eq_ignore_ascii_case("blue") => 4,
            (16, 2) if color.eq_ignore_ascii_case("green") => 5,
            (16, 2) if color.eq_ignore_ascii_case("blue") => 6,
            _ => 0,
        };
        if type_code != 0 {
            self.device.frame(&[LCD_CMD_DISPLAYTYPE, type_code])?;
        }
        Ok(type_code)
    }

    /// Set the display contrast. The module multiplexes contrast and
    /// brightness onto one register, so this overwrites any value set with
    /// [`set_brightness`](Self::set_brightness).
    pub fn set_contrast(&mut self, contrast: u8) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.frame(&[LCD_CMD_CONTRASTSET, contrast])?;
        Ok(self)
    }

    /// Set the backlight brightness. Shares a register with
    /// [`set_contrast`](Self::set_contrast); the two settings overwrite each
    /// other.
    pub fn set_brightness(&mut self, brightness: u8) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.frame(&[LCD_CMD_BRIGHTNESSSET, brightness])?;
        Ok(self)
    }

    /// Reprogram the module's I2C address. Only even addresses in
    /// `0xC6..=0xCE` are accepted; anything else returns
    /// [`Lcd03Error::InvalidAddress`] without touching the bus. On success the
    /// driver follows the module to its new address.
    pub fn change_address(&mut self, address: u8) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.change_address(address)?;
        Ok(self)
    }

    /// Read how many bytes of the module's receive buffer are currently free.
    pub fn buffer_free_bytes(&mut self) -> Result<u8, Lcd03Error<I2C>> {
        self.device.buffer_free_bytes()
    }

    /// Read the state of the attached keypad.
    pub fn read_keypad(&mut self) -> Result<KeypadState, Lcd03Error<I2C>> {
        Ok(KeypadState(self.device.read_keypad_raw()?))
    }

    /// Write a single byte to the display in one transaction. Values 0 to 7
    /// are remapped to the custom glyph slots, matching the LiquidCrystal
    /// convention. Returns the number of bytes written, always 1.
    pub fn write_byte(&mut self, value: u8) -> Result<usize, Lcd03Error<I2C>> {
        let value = if value < 8 {
            value + LCD_CUSTOMCHAR_BASE
        } else {
            value
        };
        self.device.frame(&[value])?;
        Ok(1)
    }

    /// Write a buffer of bytes to the display, splitting into multiple
    /// transactions as needed and throttling on the module's free-buffer
    /// counter. Returns the number of bytes written, always the full buffer
    /// length.
    pub fn write_bytes(&mut self, buffer: &[u8]) -> Result<usize, Lcd03Error<I2C>> {
        self.device.write_text(buffer)
    }

    /// Prints a string to the LCD at the current cursor position.
    pub fn print(&mut self, text: &str) -> Result<&mut Self, Lcd03Error<I2C>> {
        self.device.write_text(text.as_bytes())?;
        Ok(self)
    }
}

/// Implement the `core::fmt::Write` trait for the LCD03, allowing it to be used with the
/// `write!` macro. This is a convenience method for printing to the display.
impl<I2C, DELAY> core::fmt::Write for Lcd03<I2C, DELAY>
where
    I2C: i2c::I2c,
    DELAY: DelayNs,
{
    fn write_str(&mut self, s: &str) -> Result<(), core::fmt::Error> {
        if let Err(_e) = self.print(s) {
            return Err(core::fmt::Error);
        }
        Ok(())
    }
}

#[cfg(feature = "ufmt")]
/// Implement the `ufmt::uWrite` trait for the LCD03, allowing it to be used with the
/// `uwriteln!` and `uwrite!` macros. This is a convenience method for printing to the display.
impl<I2C, DELAY> ufmt::uWrite for Lcd03<I2C, DELAY>
where
    I2C: i2c::I2c,
    DELAY: DelayNs,
{
    fn write_str(&mut self, s: &str) -> Result<(), Lcd03Error<I2C>> {
        if let Err(e) = self.print(s) {
            return Err(e);
        }
        Ok(())
    }

    type Error = Lcd03Error<I2C>;
}
