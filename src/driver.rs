use embedded_hal::{delay::DelayNs, i2c};

use crate::Lcd03Error;

/// Factory default I2C address of the LCD03, as printed on the module. This is
/// the 8-bit protocol address; the driver halves it internally for the 7-bit
/// addressing used by `embedded-hal`.
pub const DEFAULT_I2C_ADDRESS: u8 = 0xC6;

// command register. every frame starts with this byte.
pub(crate) const REG_COMMAND: u8 = 0x00;

// commands
pub(crate) const LCD_CMD_CURSORHOME: u8 = 0x01; //  Move cursor to home position
pub(crate) const LCD_CMD_CURSORPOS: u8 = 0x02; //  Set cursor to a 1-based linear position
pub(crate) const LCD_CMD_CURSORPOSXY: u8 = 0x03; //  Set cursor to 1-based row/column position
pub(crate) const LCD_CMD_CURSOROFF: u8 = 0x04; //  Hide the cursor
pub(crate) const LCD_CMD_CURSORON: u8 = 0x05; //  Show an underline cursor
pub(crate) const LCD_CMD_CURSORBLINK: u8 = 0x06; //  Show a blinking block cursor
pub(crate) const LCD_CMD_BACKSPACE: u8 = 0x08; //  Delete the character before the cursor
pub(crate) const LCD_CMD_TAB: u8 = 0x09; //  Advance cursor to the next tab stop
pub(crate) const LCD_CMD_CURSORDOWN: u8 = 0x0A; //  Move cursor down one line
pub(crate) const LCD_CMD_CURSORUP: u8 = 0x0B; //  Move cursor up one line
pub(crate) const LCD_CMD_CLEARDISPLAY: u8 = 0x0C; //  Clear display and home the cursor
pub(crate) const LCD_CMD_LINEFEED: u8 = 0x0D; //  Move cursor to the start of the next line
pub(crate) const LCD_CMD_CLEARCOLUMN: u8 = 0x11; //  Clear the cursor column and move right
pub(crate) const LCD_CMD_TABSET: u8 = 0x12; //  Set the tab stop width
pub(crate) const LCD_CMD_BACKLIGHTON: u8 = 0x13; //  Turn the backlight on
pub(crate) const LCD_CMD_BACKLIGHTOFF: u8 = 0x14; //  Turn the backlight off
pub(crate) const LCD_CMD_DISABLEMESSAGE: u8 = 0x15; //  Suppress the startup message
pub(crate) const LCD_CMD_ENABLEMESSAGE: u8 = 0x16; //  Show the startup message
pub(crate) const LCD_CMD_SAVEMESSAGE: u8 = 0x17; //  Save current display as the startup message
pub(crate) const LCD_CMD_DISPLAYTYPE: u8 = 0x18; //  Configure the attached display geometry/color
pub(crate) const LCD_CMD_CHANGEADDRESS: u8 = 0x19; //  Reprogram the module's I2C address
pub(crate) const LCD_CMD_CUSTOMCHAR: u8 = 0x1B; //  Define a custom character glyph
pub(crate) const LCD_CMD_DOUBLERATESCAN: u8 = 0x1C; //  Double the keypad scan rate
pub(crate) const LCD_CMD_NORMALRATESCAN: u8 = 0x1D; //  Restore the normal keypad scan rate
pub(crate) const LCD_CMD_CONTRASTSET: u8 = 0x1E; //  Set contrast; shares a register with brightness
pub(crate) const LCD_CMD_BRIGHTNESSSET: u8 = 0x1E; //  Set brightness; shares a register with contrast

// custom character glyphs
pub(crate) const LCD_CUSTOMCHAR_BASE: u8 = 0x80; //  Device slot for caller-visible glyph 0
pub(crate) const LCD_CUSTOMCHAR_MASK: u8 = 0b1110_0000; //  High bits the device expects set on pattern rows

// address change unlock sequence, guards against accidental reprogramming
const ADDRESS_UNLOCK: [u8; 3] = [0xA0, 0xAA, 0xA5];

/// Largest number of bytes shipped in one I2C transaction, matching the
/// classic Wire library transaction limit the LCD03 was designed around.
pub(crate) const I2C_CHUNK_SIZE: usize = 32;

// bounded replacement for the original unbounded busy-wait on the device's
// free-space counter. worst case this waits 100ms before giving up.
const BUFFER_POLL_LIMIT: u32 = 1000;
const BUFFER_POLL_INTERVAL_US: u32 = 100;

/// Wire-level access to one LCD03 module. Owns the bus, the delay source, and
/// the module's current 7-bit address. All display commands are framed here;
/// the high-level API in the crate root builds on these primitives.
pub(crate) struct Lcd03Device<I2C, DELAY>
where
    I2C: i2c::I2c,
    DELAY: DelayNs,
{
    i2c: I2C,
    delay: DELAY,
    /// 7-bit working address, always `protocol_address >> 1`
    address: u8,
}

impl<I2C, DELAY> Lcd03Device<I2C, DELAY>
where
    I2C: i2c::I2c,
    DELAY: DelayNs,
{
    /// Create a device handle from the 8-bit protocol address printed on the
    /// module. The address is halved to the 7-bit form used on the bus.
    pub(crate) fn new(i2c: I2C, address: u8, delay: DELAY) -> Self {
        Self {
            i2c,
            delay,
            address: address >> 1,
        }
    }

    /// The 7-bit address currently used to reach the module.
    pub(crate) fn address(&self) -> u8 {
        self.address
    }

    /// returns the I2C peripheral. mostly needed for testing
    pub(crate) fn i2c(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    /// Send one command frame: the command register selector followed by the
    /// payload, as a single transaction. Payload must fit in one chunk.
    pub(crate) fn frame(&mut self, payload: &[u8]) -> Result<(), Lcd03Error<I2C>> {
        let mut buffer = [REG_COMMAND; I2C_CHUNK_SIZE];
        buffer[1..=payload.len()].copy_from_slice(payload);
        self.i2c
            .write(self.address, &buffer[..payload.len() + 1])
            .map_err(Lcd03Error::I2cError)
    }

    /// Send a single-opcode command frame.
    pub(crate) fn command(&mut self, opcode: u8) -> Result<(), Lcd03Error<I2C>> {
        self.frame(&[opcode])
    }

    /// Read the module's free receive-buffer byte count.
    pub(crate) fn buffer_free_bytes(&mut self) -> Result<u8, Lcd03Error<I2C>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .read(self.address, &mut buffer)
            .map_err(Lcd03Error::I2cError)?;
        Ok(buffer[0])
    }

    /// Poll the free-space counter until the module can take a full chunk.
    /// The LCD03 has a 64 byte receive FIFO and drains it slower than the bus
    /// can fill it; writing without this check silently drops bytes.
    fn wait_for_buffer_space(&mut self) -> Result<(), Lcd03Error<I2C>> {
        for _ in 0..BUFFER_POLL_LIMIT {
            if self.buffer_free_bytes()? as usize >= I2C_CHUNK_SIZE {
                return Ok(());
            }
            self.delay.delay_us(BUFFER_POLL_INTERVAL_US);
        }
        Err(Lcd03Error::BufferTimeout)
    }

    /// Write a run of text bytes, splitting into as many transactions as the
    /// chunk size requires. Each transaction re-sends the command register
    /// selector and is preceded by a free-space poll. Returns the full count;
    /// the device offers no partial-write signal.
    pub(crate) fn write_text(&mut self, data: &[u8]) -> Result<usize, Lcd03Error<I2C>> {
        for chunk in data.chunks(I2C_CHUNK_SIZE - 1) {
            self.wait_for_buffer_space()?;
            self.frame(chunk)?;
        }
        Ok(data.len())
    }

    /// Read the raw keypad bitmask. The module prepends a status byte to the
    /// keypad register pair, which is discarded.
    pub(crate) fn read_keypad_raw(&mut self) -> Result<u16, Lcd03Error<I2C>> {
        let mut buffer = [0u8; 3];
        self.i2c
            .read(self.address, &mut buffer)
            .map_err(Lcd03Error::I2cError)?;
        Ok(u16::from(buffer[1]) | u16::from(buffer[2]) << 8)
    }

    /// Reprogram the module's I2C address. Only even addresses in
    /// `0xC6..=0xCE` are legal; anything else is rejected without touching the
    /// bus. On success the working address follows the new one.
    pub(crate) fn change_address(&mut self, address: u8) -> Result<(), Lcd03Error<I2C>> {
        if !(0xC6..=0xCE).contains(&address) || address % 2 != 0 {
            return Err(Lcd03Error::InvalidAddress);
        }
        self.frame(&[
            LCD_CMD_CHANGEADDRESS,
            ADDRESS_UNLOCK[0],
            ADDRESS_UNLOCK[1],
            ADDRESS_UNLOCK[2],
            address,
        ])?;
        self.address = address >> 1;
        Ok(())
    }
}

#[cfg(test)]
mod driver_tests {
    extern crate std;
    use super::*;
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        i2c::{Mock as I2cMock, Transaction as I2cTransaction},
    };

    // 0xC6 >> 1
    const ADDR: u8 = 0x63;

    fn device(transactions: &[I2cTransaction]) -> Lcd03Device<I2cMock, NoopDelay> {
        Lcd03Device::new(I2cMock::new(transactions), DEFAULT_I2C_ADDRESS, NoopDelay::new())
    }

    #[test]
    fn test_command_frame_shape() {
        let expected = std::vec![I2cTransaction::write(
            ADDR,
            std::vec![REG_COMMAND, LCD_CMD_CLEARDISPLAY]
        )];
        let mut dev = device(&expected);
        dev.command(LCD_CMD_CLEARDISPLAY).unwrap();
        dev.i2c().done();
    }

    #[test]
    fn test_address_is_halved_at_construction() {
        let mut dev = device(&[]);
        assert_eq!(dev.address(), ADDR);
        dev.i2c().done();
    }

    #[test]
    fn test_write_text_splits_at_chunk_boundary() {
        let data: std::vec::Vec<u8> = (0..50u8).collect();
        let mut first = std::vec![REG_COMMAND];
        first.extend_from_slice(&data[..31]);
        let mut second = std::vec![REG_COMMAND];
        second.extend_from_slice(&data[31..]);
        let expected = std::vec![
            // free-space poll before each transaction
            I2cTransaction::read(ADDR, std::vec![64]),
            I2cTransaction::write(ADDR, first),
            I2cTransaction::read(ADDR, std::vec![64]),
            I2cTransaction::write(ADDR, second),
        ];
        let mut dev = device(&expected);
        assert_eq!(dev.write_text(&data).unwrap(), 50);
        dev.i2c().done();
    }

    #[test]
    fn test_write_text_waits_for_buffer_space() {
        let expected = std::vec![
            // device reports a nearly full buffer twice before draining
            I2cTransaction::read(ADDR, std::vec![4]),
            I2cTransaction::read(ADDR, std::vec![17]),
            I2cTransaction::read(ADDR, std::vec![64]),
            I2cTransaction::write(ADDR, std::vec![REG_COMMAND, b'h', b'i']),
        ];
        let mut dev = device(&expected);
        assert_eq!(dev.write_text(b"hi").unwrap(), 2);
        dev.i2c().done();
    }

    #[test]
    fn test_write_text_times_out_when_buffer_never_drains() {
        // device stuck reporting a full receive buffer for the whole retry budget
        let expected =
            std::vec![I2cTransaction::read(ADDR, std::vec![0]); BUFFER_POLL_LIMIT as usize];
        let mut dev = device(&expected);
        assert!(matches!(
            dev.write_text(b"stalled"),
            Err(Lcd03Error::BufferTimeout)
        ));
        // every poll consumed, no write transaction opened
        dev.i2c().done();
    }

    #[test]
    fn test_change_address_accepts_even_in_range() {
        let expected = std::vec![I2cTransaction::write(
            ADDR,
            std::vec![REG_COMMAND, LCD_CMD_CHANGEADDRESS, 0xA0, 0xAA, 0xA5, 0xC8],
        )];
        let mut dev = device(&expected);
        dev.change_address(0xC8).unwrap();
        assert_eq!(dev.address(), 0xC8 >> 1);
        dev.i2c().done();
    }

    #[test]
    fn test_change_address_rejects_odd_and_out_of_range() {
        let mut dev = device(&[]);
        assert!(matches!(dev.change_address(0xC7), Err(Lcd03Error::InvalidAddress)));
        assert!(matches!(dev.change_address(0xD0), Err(Lcd03Error::InvalidAddress)));
        assert!(matches!(dev.change_address(0xC4), Err(Lcd03Error::InvalidAddress)));
        // no frame sent, working address untouched
        assert_eq!(dev.address(), ADDR);
        dev.i2c().done();
    }

    #[test]
    fn test_read_keypad_raw_discards_status_byte() {
        let expected = std::vec![I2cTransaction::read(ADDR, std::vec![0xFF, 0x01, 0x02])];
        let mut dev = device(&expected);
        assert_eq!(dev.read_keypad_raw().unwrap(), 0x0201);
        dev.i2c().done();
    }

    #[test]
    fn test_buffer_free_bytes() {
        let expected = std::vec![I2cTransaction::read(ADDR, std::vec![57])];
        let mut dev = device(&expected);
        assert_eq!(dev.buffer_free_bytes().unwrap(), 57);
        dev.i2c().done();
    }
}
