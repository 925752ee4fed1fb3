pub struct Cmd;
impl Cmd {
    // Init
    pub const CMDH: u8 = 0xAA;
    pub const PANEL_SETTING: u8 = 0x00;
    pub const POWER_SETTING: u8 = 0x01;
    pub const POWER_OFF_SEQUENCE: u8 = 0x03;
    pub const BOOSTER_SOFT_START_1: u8 = 0x05;
    pub const BOOSTER_SOFT_START_2: u8 = 0x06;
    pub const BOOSTER_SOFT_START_3: u8 = 0x08;
    pub const IPC: u8 = 0x13;
    pub const PLL_CONTROL: u8 = 0x30;
    pub const TEMP_SENSOR_ENABLE: u8 = 0x41;
    pub const VCOM_DATA_INTERVAL: u8 = 0x50;
    pub const TCON_SETTING: u8 = 0x60;
    pub const RESOLUTION_SETTING: u8 = 0x61;
    pub const VCOM_DC_TRIM: u8 = 0x84;
    pub const POWER_SAVING: u8 = 0xE3;

    // Update
    pub const POWER_ON: u8 = 0x04;
    pub const DATA_START: u8 = 0x10;
    pub const DISPLAY_REFRESH: u8 = 0x12;
    pub const DEEP_SLEEP: u8 = 0x07;
}

/*
Vendor reference sequence uses these registers:
0xAA - Command definition unlock (CMDH)
0x00 - Panel setting (PSR)
0x01 - Power setting (PWR)
0x03 - Power off sequence setting (PFS)
0x05/0x06/0x08 - Booster soft start phases
0x13 - Internal power control (IPC)
0x30 - PLL / frame rate
0x41 - Temperature sensor enable (TSE)
0x50 - VCOM and data interval (CDI)
0x60 - Gate/source non-overlap (TCON)
0x61 - Resolution setting (TRES)
0x84 - VCOM DC trim (T_VDCS)
0xE3 - Power saving (PWS)
0x04 - Power on, 0x10 - Data start, 0x12 - Refresh, 0x07 - Deep sleep
*/
