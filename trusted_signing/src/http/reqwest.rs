// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use http::{Request, Response};

use crate::http::{HttpResolverError, SyncHttpResolver};

impl SyncHttpResolver for reqwest::blocking::Client {
    fn http_resolve(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<Response<Vec<u8>>, HttpResolverError> {
        let response = self.execute(request.try_into()?)?;

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        for (name, value) in response.headers().iter() {
            builder = builder.header(name, value);
        }

        Ok(builder.body(response.bytes()?.to_vec())?)
    }
}

impl From<reqwest::Error> for HttpResolverError {
    fn from(err: reqwest::Error) -> Self {
        Self::Other(Box::new(err))
    }
}
