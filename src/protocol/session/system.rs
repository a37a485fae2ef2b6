use super::{
    super::{
        error::{Error, Result},
        frame::{
            build_read_clock, build_read_szl, build_write_clock, parse_user_data_ack,
            parse_user_data_response, CpuFunctionGroup, CpuStatus, SUBFUNCTION_READ_CLOCK,
            SUBFUNCTION_READ_SZL, SUBFUNCTION_WRITE_CLOCK,
        },
        value::datetime::{byte_to_bcd, decode_date_time, encode_date_time, DATE_TIME_LEN},
    },
    Session,
};
use chrono::{Datelike, NaiveDateTime, SubsecRound};

/// Reserved byte and BCD century byte ahead of the DATE_AND_TIME value
const CLOCK_PREFIX_LEN: usize = 2;
const CLOCK_DATA_LEN: usize = CLOCK_PREFIX_LEN + DATE_TIME_LEN;

/// SZL partial list "module status"
const SZL_ID_CPU_STATE: u16 = 0x0424;
/// SZL id, index, record length and record count precede the first record
const SZL_HEADER_LEN: usize = 8;
/// Operating mode nibble within the first record
const CPU_STATE_OFFSET: usize = SZL_HEADER_LEN + 3;

/// Clock and CPU status over the UserData sub-protocol
impl Session {
    /// Read the PLC system clock.
    pub async fn read_clock(&self) -> Result<NaiveDateTime> {
        self.submit(build_read_clock(), |pdu| {
            let resp =
                parse_user_data_response(pdu, CpuFunctionGroup::TimeFunctions, SUBFUNCTION_READ_CLOCK)?;
            let raw = resp
                .data
                .get(CLOCK_PREFIX_LEN..CLOCK_DATA_LEN)
                .ok_or(Error::InsufficientData {
                    needed: CLOCK_DATA_LEN,
                    available: resp.data.len(),
                })?;
            decode_date_time(raw)
        })
        .await
    }

    /// Set the PLC system clock. Precision below one millisecond is dropped.
    pub async fn write_clock(&self, value: &NaiveDateTime) -> Result<()> {
        let value = value.trunc_subsecs(3);
        let mut timestamp = [0u8; CLOCK_DATA_LEN];
        timestamp[CLOCK_PREFIX_LEN..].copy_from_slice(&encode_date_time(&value)?);
        // year is 1990..=2089 once encoded
        timestamp[1] = byte_to_bcd((value.year() / 100) as u8);
        self.submit(build_write_clock(&timestamp), |pdu| {
            parse_user_data_ack(pdu, CpuFunctionGroup::TimeFunctions, SUBFUNCTION_WRITE_CLOCK)
        })
        .await
    }

    /// Raw CPU operating mode code from SZL 0x0424 (0x08 run, 0x04 stop).
    pub async fn read_status(&self) -> Result<u8> {
        self.submit(build_read_szl(SZL_ID_CPU_STATE, 0x0000), |pdu| {
            let resp =
                parse_user_data_response(pdu, CpuFunctionGroup::CpuFunctions, SUBFUNCTION_READ_SZL)?;
            resp.data
                .get(CPU_STATE_OFFSET)
                .map(|b| b & 0x0F)
                .ok_or(Error::InsufficientData {
                    needed: CPU_STATE_OFFSET + 1,
                    available: resp.data.len(),
                })
        })
        .await
    }

    pub async fn cpu_status(&self) -> Result<CpuStatus> {
        self.read_status().await.map(CpuStatus::from)
    }
}
