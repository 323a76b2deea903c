//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Extension points for protocol and policy specific behavior.

use crate::transport::SessionRef;

/// Hooks a proxy service calls at fixed points of a proxied connection.
///
/// Extensions are the place to add protocol framing, authentication or
/// header rewriting without touching the bridging core. Every hook runs on
/// an I/O callback and must not block.
pub trait ProxyServiceExtension: Send + Sync {
    /// Called when a client session is created, before it opens.
    fn init_accept_session(&self, _accept: &SessionRef) {}

    /// Called when the backend session for a client exists, possibly before
    /// it is connected.
    fn init_connect_session(&self, _connect: &SessionRef) {}

    /// Called once both sessions are connected, just before they are bridged.
    fn proxied_connection_established(&self, _accept: &SessionRef, _connect: &SessionRef) {}
}
