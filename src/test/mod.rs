// SPDX-License-Identifier: Apache-2.0
//! Mock collaborators shared by the driver tests.

mod mock;

pub(crate) use mock::*;
