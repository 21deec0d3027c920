//! Cellular adapter surface
//!
//! A modem attaches on its own once powered; the firmware can only observe
//! the outcome by polling. Any link whose bring-up is managed outside the
//! application (DHCP on a wired PHY, for instance) has the same shape.

use crate::net::LinkInfo;

pub trait CellularAdapter {
    /// Whether the modem currently reports an attached data link
    fn is_connected(&self) -> bool;

    /// Addresses of the data link, `None` until they have been assigned
    fn link_info(&self) -> Option<LinkInfo>;
}
